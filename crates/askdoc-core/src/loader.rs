//! Reading a corpus into ordered [`TextRecord`]s: PDF pages or CSV question/answer rows.
//!
//! Pages and rows that cannot be read are skipped and counted, never fatal on their
//! own; a source that yields nothing at all is a [`LoadError`].

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::CsvColumns;
use crate::record::{CorpusKind, TextRecord, ANSWER_KEY, CONTACT_KEY};

/// Where a corpus comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    /// Uploaded content. `name` is only used to detect the kind and for messages.
    Bytes { data: Vec<u8>, name: String },
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(data: Vec<u8>, name: impl Into<String>) -> Self {
        Self::Bytes {
            data,
            name: name.into(),
        }
    }

    /// Short name for logs and messages.
    pub fn label(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    /// Corpus kind, from the file extension.
    pub fn kind(&self) -> Result<CorpusKind, LoadError> {
        let name = self.label();
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Ok(CorpusKind::Pdf),
            Some("csv") => Ok(CorpusKind::Csv),
            _ => Err(LoadError::UnsupportedSource(name)),
        }
    }
}

/// Records read from one source, before any chunking.
#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub kind: CorpusKind,
    /// One record per non-empty PDF page or per usable CSV row, ids in order.
    pub units: Vec<TextRecord>,
    /// Pages or rows that were dropped because they failed or were blank.
    pub skipped: usize,
}

/// Page-level PDF text extraction.
pub trait PdfExtractor: Send + Sync {
    /// Text of every page in order; `None` for a page whose extraction failed.
    /// Errors only when the document as a whole cannot be read.
    fn page_texts(&self, path: &Path) -> Result<Vec<Option<String>>, LoadError>;
}

/// [`PdfExtractor`] backed by the `lopdf` parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn page_texts(&self, path: &Path) -> Result<Vec<Option<String>>, LoadError> {
        let doc = lopdf::Document::load(path)
            .map_err(|e| LoadError::NoExtractableText(format!("unreadable PDF: {e}")))?;
        let pages = doc
            .get_pages()
            .keys()
            .map(|&page| match doc.extract_text(&[page]) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(page, error = %e, "page text extraction failed");
                    None
                }
            })
            .collect();
        Ok(pages)
    }
}

/// Load `source` into records. The kind is taken from the source's extension.
pub fn load_corpus(
    source: &Source,
    columns: &CsvColumns,
    pdf: &dyn PdfExtractor,
) -> Result<LoadedCorpus, LoadError> {
    match source.kind()? {
        CorpusKind::Pdf => load_pdf(source, pdf),
        CorpusKind::Csv => load_csv(source, columns),
    }
}

/// One record per page with text. In-memory bytes are spooled to a temp file
/// that is removed whatever happens during extraction.
pub fn load_pdf(source: &Source, pdf: &dyn PdfExtractor) -> Result<LoadedCorpus, LoadError> {
    let pages = match source {
        Source::Path(path) => pdf.page_texts(path)?,
        Source::Bytes { data, .. } => {
            let mut tmp = tempfile::Builder::new()
                .prefix("askdoc-")
                .suffix(".pdf")
                .tempfile()?;
            tmp.write_all(data)?;
            tmp.flush()?;
            let pages = pdf.page_texts(tmp.path());
            if let Err(e) = tmp.close() {
                warn!(error = %e, "could not remove temporary PDF");
            }
            pages?
        }
    };

    let total = pages.len();
    let units: Vec<TextRecord> = pages
        .into_iter()
        .flatten()
        .filter(|text| !text.trim().is_empty())
        .enumerate()
        .map(|(id, text)| TextRecord::new(id, text))
        .collect();
    let skipped = total - units.len();
    if units.is_empty() {
        return Err(LoadError::NoExtractableText(format!(
            "{} page(s), none with readable text",
            total
        )));
    }
    if skipped > 0 {
        warn!(source = %source.label(), skipped, total, "skipped PDF pages without text");
    }
    Ok(LoadedCorpus {
        kind: CorpusKind::Pdf,
        units,
        skipped,
    })
}

/// One record per data row: content is the question, metadata the answer and contact.
pub fn load_csv(source: &Source, columns: &CsvColumns) -> Result<LoadedCorpus, LoadError> {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true);
    match source {
        Source::Path(path) => read_csv(builder.from_path(path)?, columns, source),
        Source::Bytes { data, .. } => read_csv(builder.from_reader(data.as_slice()), columns, source),
    }
}

fn read_csv<R: Read>(
    mut rdr: csv::Reader<R>,
    columns: &CsvColumns,
    source: &Source,
) -> Result<LoadedCorpus, LoadError> {
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| cell(h).trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let question = find_column(&headers, &columns.question, "question")?;
    let answer = find_column(&headers, &columns.answer, "answer")?;
    let contact = headers.iter().position(|h| columns.contact.contains(h));

    let mut units = Vec::new();
    let mut skipped = 0;
    for (row, record) in rdr.byte_records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(source = %source.label(), row = row + 1, error = %e, "skipping unreadable CSV row");
                skipped += 1;
                continue;
            }
        };
        let field = |i: usize| record.get(i).map(cell).unwrap_or_default();
        let q = field(question).trim().to_string();
        if q.is_empty() {
            debug!(row = row + 1, "skipping CSV row without a question");
            skipped += 1;
            continue;
        }
        let mut unit = TextRecord::new(units.len(), q).with_meta(ANSWER_KEY, field(answer).trim());
        if let Some(c) = contact {
            unit = unit.with_meta(CONTACT_KEY, field(c).trim());
        }
        units.push(unit);
    }

    if units.is_empty() {
        return Err(LoadError::EmptyCorpus);
    }
    if skipped > 0 {
        warn!(source = %source.label(), skipped, loaded = units.len(), "skipped CSV rows");
    }
    Ok(LoadedCorpus {
        kind: CorpusKind::Csv,
        units,
        skipped,
    })
}

fn find_column(
    headers: &[String],
    accepted: &[String],
    column: &'static str,
) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| accepted.contains(h))
        .ok_or_else(|| LoadError::SchemaMismatch {
            column,
            accepted: accepted.to_vec(),
            found: headers.to_vec(),
        })
}

/// Cells are taken as text whatever their encoding.
fn cell(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no extractable text ({0})")]
    NoExtractableText(String),
    #[error("schema mismatch: no {column} column (accepted headers: {accepted:?}, found: {found:?})")]
    SchemaMismatch {
        column: &'static str,
        accepted: Vec<String>,
        found: Vec<String>,
    },
    #[error("empty corpus: the CSV has no usable rows")]
    EmptyCorpus,
    #[error("corpus too short: no text left to index after chunking")]
    CorpusTooShort,
    #[error("unsupported source {0:?}: expected a .pdf or .csv file")]
    UnsupportedSource(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}


#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::stub::FixedPages;
    use super::*;

    fn csv(text: &str) -> Source {
        Source::bytes(text.as_bytes().to_vec(), "faq.csv")
    }

    #[test]
    fn kind_comes_from_extension() {
        assert_eq!(Source::path("a/Manuale.PDF").kind().unwrap(), CorpusKind::Pdf);
        assert_eq!(csv("").kind().unwrap(), CorpusKind::Csv);
        assert!(matches!(
            Source::path("notes.txt").kind(),
            Err(LoadError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn csv_rows_become_question_records() {
        let src = csv("domanda,risposta\nCome resetto la password?,Vai su Impostazioni > Sicurezza\n");
        let c = load_csv(&src, &CsvColumns::default()).unwrap();
        assert_eq!(c.kind, CorpusKind::Csv);
        assert_eq!(c.skipped, 0);
        assert_eq!(c.units.len(), 1);
        assert_eq!(c.units[0].id, 0);
        assert_eq!(c.units[0].content, "Come resetto la password?");
        assert_eq!(c.units[0].answer(), Some("Vai su Impostazioni > Sicurezza"));
        assert_eq!(c.units[0].contact(), None);
    }

    #[test]
    fn csv_contact_column_is_optional_metadata() {
        let src = csv(
            "\u{feff}Domanda,Risposta,chi_interpellare\nQ1,A1,Mario\nQ2,A2,\n",
        );
        let c = load_csv(&src, &CsvColumns::default()).unwrap();
        assert_eq!(c.units[0].contact(), Some("Mario"));
        assert_eq!(c.units[1].contact(), None);
        assert_eq!(c.units[1].metadata.get(CONTACT_KEY).map(String::as_str), Some(""));
    }

    #[test]
    fn header_only_csv_is_an_empty_corpus() {
        let err = load_csv(&csv("domanda,risposta\n"), &CsvColumns::default()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyCorpus));
    }

    #[test]
    fn missing_required_column_is_a_schema_mismatch() {
        let err = load_csv(&csv("question,answer\nq,a\n"), &CsvColumns::default()).unwrap_err();
        match err {
            LoadError::SchemaMismatch { column, found, .. } => {
                assert_eq!(column, "question");
                assert_eq!(found, vec!["question", "answer"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            load_csv(&csv(""), &CsvColumns::default()),
            Err(LoadError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn blank_questions_are_skipped_and_counted() {
        let src = csv("domanda,risposta\n  ,orphan\nQ,A\nshort-row\n");
        let c = load_csv(&src, &CsvColumns::default()).unwrap();
        assert_eq!(c.units.len(), 2);
        assert_eq!(c.units[1].content, "short-row");
        assert_eq!(c.units[1].answer(), Some(""));
        assert_eq!(c.skipped, 1);
        assert_eq!(c.units.iter().map(|u| u.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn non_utf8_cells_are_coerced() {
        let mut data = b"domanda,risposta\nperch".to_vec();
        data.push(0xe9);
        data.extend_from_slice(b",ok\n");
        let c = load_csv(&Source::bytes(data, "x.csv"), &CsvColumns::default()).unwrap();
        assert!(c.units[0].content.starts_with("perch"));
    }

    #[test]
    fn csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.csv");
        std::fs::write(&path, "domanda,risposta\n1,2\n").unwrap();
        let c = load_corpus(&Source::path(&path), &CsvColumns::default(), &LopdfExtractor).unwrap();
        assert_eq!(c.units[0].content, "1");
        assert_eq!(c.units[0].answer(), Some("2"));
    }

    #[test]
    fn pdf_pages_without_text_are_skipped() {
        let pdf = FixedPages::new(&[Some("Pagina uno"), None, Some("   "), Some("Pagina quattro")]);
        let c = load_pdf(&Source::bytes(b"%PDF".to_vec(), "m.pdf"), &pdf).unwrap();
        assert_eq!(c.kind, CorpusKind::Pdf);
        assert_eq!(c.skipped, 2);
        let contents: Vec<&str> = c.units.iter().map(|u| u.content.as_str()).collect();
        assert_eq!(contents, vec!["Pagina uno", "Pagina quattro"]);
        assert_eq!(c.units[1].id, 1);
    }

    #[test]
    fn garbled_pdf_has_no_extractable_text() {
        let pdf = FixedPages::new(&[None, Some(""), None]);
        let err = load_pdf(&Source::bytes(b"%PDF".to_vec(), "m.pdf"), &pdf).unwrap_err();
        assert!(matches!(err, LoadError::NoExtractableText(_)));
    }

    /// A PDF with one page per entry; `None` pages get an empty content stream.
    fn pdf_bytes(pages: &[Option<&str>]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier"
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id }
        });
        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = match text {
                Some(t) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*t)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()]
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn real_pdf_yields_one_record_per_text_page_in_order() {
        let data = pdf_bytes(&[Some("Pagina uno testo"), None, Some("Pagina tre testo")]);
        let c = load_pdf(&Source::bytes(data, "manuale.pdf"), &LopdfExtractor).unwrap();
        assert_eq!(c.kind, CorpusKind::Pdf);
        assert_eq!(c.skipped, 1);
        let contents: Vec<&str> = c.units.iter().map(|u| u.content.trim()).collect();
        assert_eq!(contents, vec!["Pagina uno testo", "Pagina tre testo"]);
        assert_eq!(c.units.iter().map(|u| u.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn real_pdf_from_disk_without_text_has_no_extractable_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vuoto.pdf");
        std::fs::write(&path, pdf_bytes(&[None, None])).unwrap();
        let err = load_pdf(&Source::path(&path), &LopdfExtractor).unwrap_err();
        assert!(matches!(err, LoadError::NoExtractableText(_)));
    }

    #[test]
    fn unreadable_pdf_bytes_have_no_extractable_text() {
        let src = Source::bytes(b"this is not a pdf".to_vec(), "broken.pdf");
        let err = load_pdf(&src, &LopdfExtractor).unwrap_err();
        assert!(matches!(err, LoadError::NoExtractableText(_)));
    }

    #[test]
    fn temp_file_is_removed_after_success_and_failure() {
        let ok = FixedPages::new(&[Some("testo")]);
        load_pdf(&Source::bytes(b"%PDF".to_vec(), "m.pdf"), &ok).unwrap();
        let path = ok.seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());

        let empty = FixedPages::new(&[None]);
        load_pdf(&Source::bytes(b"%PDF".to_vec(), "m.pdf"), &empty).unwrap_err();
        let path = empty.seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn temp_file_is_removed_when_extractor_panics() {
        let boom = FixedPages {
            panic: true,
            ..FixedPages::default()
        };
        let res = catch_unwind(AssertUnwindSafe(|| {
            load_pdf(&Source::bytes(b"%PDF".to_vec(), "m.pdf"), &boom)
        }));
        assert!(res.is_err());
        let path = boom.seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }
}
