//! Build and query pipeline: load → chunk → embed → index, then embed query → search.
//!
//! A [`Session`] owns its embedder, its corpus and its index. Nothing is shared
//! between sessions, and a failed rebuild leaves the live corpus in place.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, ConfigError};
use crate::embedder::{check_batch, EmbedError, Embedder};
use crate::index::{IndexError, VectorIndex};
use crate::loader::{load_corpus, LoadError, LoadedCorpus, LopdfExtractor, PdfExtractor, Source};
use crate::record::{CorpusKind, TextRecord, ANSWER_KEY};
use crate::segmenter::Segmenter;

/// Separator between hits in rendered answers.
const HIT_SEPARATOR: &str = "\n\n---\n\n";

/// One user's retrieval state.
pub struct Session<E> {
    embedder: E,
    pdf: Box<dyn PdfExtractor>,
    config: Config,
    segmenter: Segmenter,
    live: Option<LiveCorpus>,
}

/// The corpus currently answering queries. `records[i]` owns index vector `i`.
struct LiveCorpus {
    kind: CorpusKind,
    source: String,
    records: Vec<TextRecord>,
    index: VectorIndex,
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub source: String,
    pub kind: CorpusKind,
    /// Records indexed (chunks for PDF, rows for CSV).
    pub records: usize,
    /// Pages or rows dropped while loading.
    pub skipped: usize,
    pub dim: usize,
    pub model: String,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.kind {
            CorpusKind::Pdf => "chunk(s)",
            CorpusKind::Csv => "row(s)",
        };
        write!(f, "Indexed {} {} from {}", self.records, unit, self.source)?;
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

/// A matched record and its squared L2 distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub record: TextRecord,
    pub distance: f32,
}

/// Hits in ascending distance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub kind: CorpusKind,
    pub hits: Vec<Hit>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Plain-text rendering for a front-end.
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits.is_empty() {
            return f.write_str("No answer found.");
        }
        for (i, hit) in self.hits.iter().enumerate() {
            if i > 0 {
                f.write_str(HIT_SEPARATOR)?;
            }
            let r = &hit.record;
            match self.kind {
                CorpusKind::Pdf => f.write_str(&r.content)?,
                CorpusKind::Csv => {
                    write!(f, "Question: {}", r.content)?;
                    if let Some(answer) = r.answer().filter(|a| !a.trim().is_empty()) {
                        write!(f, "\nAnswer: {answer}")?;
                    }
                    if let Some(contact) = r.contact() {
                        write!(f, "\nContact: {contact}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<E: Embedder> Session<E> {
    /// Create an empty session. The config is validated up front.
    pub fn new(embedder: E, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let segmenter = config.segmenter()?;
        let cols = &config.csv_columns;
        info!(
            question = ?cols.question,
            answer = ?cols.answer,
            contact = ?cols.contact,
            "accepted CSV headers"
        );
        Ok(Self {
            embedder,
            pdf: Box::new(LopdfExtractor),
            config,
            segmenter,
            live: None,
        })
    }

    /// Replace the PDF text extractor.
    pub fn with_pdf_extractor(mut self, pdf: impl PdfExtractor + 'static) -> Self {
        self.pdf = Box::new(pdf);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Whether a corpus has been indexed.
    pub fn is_loaded(&self) -> bool {
        self.live.is_some()
    }

    pub fn kind(&self) -> Option<CorpusKind> {
        self.live.as_ref().map(|l| l.kind)
    }

    /// Source label of the live corpus.
    pub fn source(&self) -> Option<&str> {
        self.live.as_ref().map(|l| l.source.as_str())
    }

    /// Records of the live corpus, in id order. Empty before the first build.
    pub fn records(&self) -> &[TextRecord] {
        self.live
            .as_ref()
            .map(|l| l.records.as_slice())
            .unwrap_or_default()
    }

    /// Load and chunk `source` into the records that would be indexed, without embedding.
    pub fn prepare(&self, source: &Source) -> Result<LoadedCorpus, LoadError> {
        let loaded = load_corpus(source, &self.config.csv_columns, self.pdf.as_ref())?;
        match loaded.kind {
            CorpusKind::Csv => Ok(loaded),
            CorpusKind::Pdf => {
                let text = loaded
                    .units
                    .iter()
                    .map(|u| u.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                let units: Vec<TextRecord> = self
                    .segmenter
                    .segment(&text)
                    .into_iter()
                    .enumerate()
                    .map(|(id, chunk)| TextRecord::new(id, chunk))
                    .collect();
                if units.is_empty() {
                    return Err(LoadError::CorpusTooShort);
                }
                Ok(LoadedCorpus { units, ..loaded })
            }
        }
    }

    /// Build a new corpus and index from `source` and make it live.
    /// On failure the previous corpus keeps answering.
    pub async fn load(&mut self, source: &Source) -> Result<BuildReport, BuildError> {
        match self.build(source).await {
            Ok((live, report)) => {
                info!(
                    source = %report.source,
                    records = report.records,
                    skipped = report.skipped,
                    dim = report.dim,
                    model = %report.model,
                    "corpus indexed"
                );
                self.live = Some(live);
                Ok(report)
            }
            Err(e) => {
                if let Some(prev) = &self.live {
                    warn!(source = %source.label(), error = %e, kept = %prev.source, "rebuild failed; keeping previous corpus");
                } else {
                    warn!(source = %source.label(), error = %e, "build failed");
                }
                Err(e)
            }
        }
    }

    /// Build from the configured `default_corpus`.
    pub async fn load_default(&mut self) -> Result<BuildReport, BuildError> {
        let path = self
            .config
            .default_corpus
            .clone()
            .ok_or(BuildError::NoSource)?;
        self.load(&Source::Path(path)).await
    }

    async fn build(&self, source: &Source) -> Result<(LiveCorpus, BuildReport), BuildError> {
        let corpus = self.prepare(source)?;
        let texts: Vec<String> = corpus.units.iter().map(|u| u.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        check_batch(texts.len(), &vectors)?;
        let index = VectorIndex::build(vectors)?;

        let report = BuildReport {
            source: source.label(),
            kind: corpus.kind,
            records: corpus.units.len(),
            skipped: corpus.skipped,
            dim: index.dim(),
            model: self.embedder.model_name().to_string(),
        };
        let live = LiveCorpus {
            kind: corpus.kind,
            source: report.source.clone(),
            records: corpus.units,
            index,
        };
        Ok((live, report))
    }

    /// Answer `query` with up to `top_k` nearest records.
    pub async fn answer(&self, query: &str, top_k: usize) -> Result<QueryResult, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let live = self.live.as_ref().ok_or(QueryError::NoCorpusLoaded)?;

        let embedding = self.embedder.embed(query).await?;
        let neighbors = live.index.search(&embedding, top_k)?;
        debug!(query, top_k, found = neighbors.len(), "query answered");

        let hits = neighbors
            .into_iter()
            .filter_map(|n| {
                trace!(id = n.id, distance = n.distance, "neighbor");
                live.records.get(n.id).map(|r| Hit {
                    record: shaped(r),
                    distance: n.distance,
                })
            })
            .collect();
        Ok(QueryResult {
            kind: live.kind,
            hits,
        })
    }
}

/// Copy of `record` without blank optional metadata. The answer is always kept.
fn shaped(record: &TextRecord) -> TextRecord {
    let mut out = record.clone();
    out.metadata
        .retain(|k, v| k == ANSWER_KEY || !v.trim().is_empty());
    out
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("indexing failed: {0}")]
    Index(#[from] IndexError),
    #[error("no corpus given and no default_corpus configured")]
    NoSource,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("empty query: type a question first")]
    EmptyQuery,
    #[error("no corpus loaded: index a PDF or CSV before asking")]
    NoCorpusLoaded,
    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("search failed: {0}")]
    Index(#[from] IndexError),
}
