//! Where askdoc keeps its own state. Only the config file lives here; indexes are
//! rebuilt per session and never written to disk.

use std::path::PathBuf;

/// Returns the per-user data directory, creating it if needed.
/// On Linux: `~/.local/share/askdoc/`. `None` if no home directory can be found.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "askdoc", "askdoc")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
