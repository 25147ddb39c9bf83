//! Persisted config (embedding model, chunking, CSV headers, etc.) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app_data;
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL};
use crate::segmenter::{SegmentError, Segmenter, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_STEP};

const CONFIG_FILENAME: &str = "config.toml";

/// Overrides `ollama_url` when set.
pub const ENV_OLLAMA_URL: &str = "ASKDOC_OLLAMA_URL";
/// Overrides `embedding_model_name` when set.
pub const ENV_MODEL: &str = "ASKDOC_MODEL";

pub const DEFAULT_TOP_K: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding_model_name: String,
    pub ollama_url: String,
    /// Characters per chunk for unstructured sources.
    pub chunk_size: usize,
    /// Stride between chunk starts; overlap is `chunk_size - chunk_step`.
    pub chunk_step: usize,
    pub top_k: usize,
    /// Corpus to index when a build is requested without a source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_corpus: Option<PathBuf>,
    /// Canned questions a front-end can offer.
    pub example_queries: Vec<String>,
    pub csv_columns: CsvColumns,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_model_name: DEFAULT_EMBED_MODEL.to_string(),
            ollama_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_step: DEFAULT_CHUNK_STEP,
            top_k: DEFAULT_TOP_K,
            default_corpus: None,
            example_queries: vec![
                "BP non si apre o è lento".to_string(),
                "Non riesco a salvare un'anagrafica".to_string(),
                "Ho emesso una fattura su un cliente errato".to_string(),
            ],
            csv_columns: CsvColumns::default(),
        }
    }
}

/// Accepted header spellings for each CSV column. Matching is exact after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvColumns {
    pub question: Vec<String>,
    pub answer: Vec<String>,
    /// Optional column; a CSV without it still loads.
    pub contact: Vec<String>,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            question: vec!["domanda".to_string(), "Domanda".to_string()],
            answer: vec!["risposta".to_string(), "Risposta".to_string()],
            contact: vec!["chi_interpellare".to_string()],
        }
    }
}

impl Config {
    /// Check the values a build depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.segmenter()?;
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if self.csv_columns.question.is_empty() || self.csv_columns.answer.is_empty() {
            return Err(ConfigError::Invalid(
                "csv_columns.question and csv_columns.answer need at least one accepted header"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn segmenter(&self) -> Result<Segmenter, ConfigError> {
        Ok(Segmenter::new(self.chunk_size, self.chunk_step)?)
    }

    fn apply_env(&mut self) {
        if let Some(url) = std::env::var(ENV_OLLAMA_URL).ok().filter(|s| !s.is_empty()) {
            self.ollama_url = url;
        }
        if let Some(model) = std::env::var(ENV_MODEL).ok().filter(|s| !s.is_empty()) {
            self.embedding_model_name = model;
        }
    }
}

/// Path of the config file, if the app data directory is available.
pub fn config_path() -> Option<PathBuf> {
    app_data::app_data_dir().map(|d| d.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
/// Environment overrides are applied either way.
pub fn load_config() -> Config {
    let mut config = match config_path() {
        Some(path) if path.is_file() => load_config_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            Config::default()
        }),
        _ => Config::default(),
    };
    config.apply_env();
    config
}

/// Load config from an explicit file. Missing keys take their defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    toml::from_str(&s).map_err(ConfigError::Parse)
}

/// Save config to the app data directory. Returns the file written.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read config: {0}")]
    Read(std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("invalid chunking settings: {0}")]
    Chunking(#[from] SegmentError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
