//! All retrieval logic, independent of how it is driven (CLI or a UI).
//!
//! A corpus (PDF text or a CSV of question/answer rows) is loaded, chunked,
//! embedded and indexed inside a [`Session`]; queries are embedded the same way
//! and answered by exact nearest-neighbour search.

pub mod app_data;
pub mod config;
pub mod embedder;
pub mod index;
pub mod loader;
pub mod ollama;
pub mod record;
pub mod segmenter;
pub mod session;

pub use app_data::app_data_dir;
pub use config::{config_path, load_config, save_config, Config, ConfigError, CsvColumns};
pub use embedder::{EmbedError, Embedder};
pub use index::{IndexError, Neighbor, VectorIndex};
pub use loader::{LoadError, LoadedCorpus, LopdfExtractor, PdfExtractor, Source};
pub use ollama::OllamaEmbedder;
pub use record::{CorpusKind, TextRecord};
pub use segmenter::Segmenter;
pub use session::{BuildError, BuildReport, Hit, QueryError, QueryResult, Session};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "askdoc-core ready"
}
