//! The unit of retrieval: a piece of text plus optional string metadata.

use std::collections::BTreeMap;

use serde::Serialize;

/// Metadata key holding the answer text of a CSV row.
pub const ANSWER_KEY: &str = "answer";
/// Metadata key holding the (optional) contact of a CSV row.
pub const CONTACT_KEY: &str = "contact";

/// What kind of corpus a set of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    /// Unstructured text; records are overlapping chunks.
    Pdf,
    /// Question/answer table; one record per row.
    Csv,
}

/// One retrievable item. `id` is its position in the ingestion sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRecord {
    pub id: usize,
    /// Chunk text for PDF corpora, question text for CSV corpora.
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl TextRecord {
    pub fn new(id: usize, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn answer(&self) -> Option<&str> {
        self.metadata.get(ANSWER_KEY).map(String::as_str)
    }

    /// Contact field, treating a present-but-blank value as absent.
    pub fn contact(&self) -> Option<&str> {
        self.metadata
            .get(CONTACT_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}
