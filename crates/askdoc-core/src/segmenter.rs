//! Splits long text into fixed-size, overlapping character windows for embedding.
//! Only unstructured sources go through here; CSV rows are already atomic.

use tracing::warn;

/// Default window length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;
/// Default stride between window starts, in characters.
pub const DEFAULT_CHUNK_STEP: usize = 200;

/// Sliding-window chunker. Consecutive windows overlap by `size - step` characters;
/// a step larger than the size leaves the text between windows out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    size: usize,
    step: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            step: DEFAULT_CHUNK_STEP,
        }
    }
}

impl Segmenter {
    pub fn new(size: usize, step: usize) -> Result<Self, SegmentError> {
        if size == 0 || step == 0 {
            return Err(SegmentError::ZeroWindow { size, step });
        }
        if step > size {
            warn!(size, step, "chunk step exceeds chunk size; text between windows is skipped");
        }
        Ok(Self { size, step })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Chunk `text`. Windows are trimmed and empty ones dropped, so the result
    /// may be empty; callers decide what an empty corpus means.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let text = normalize(text);
        // Byte offset of every char, plus the end, so windows never split a code point.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < char_len {
            let end = (start + self.size).min(char_len);
            let window = text[bounds[start]..bounds[end]].trim();
            if !window.is_empty() {
                chunks.push(window.to_string());
            }
            start += self.step;
        }
        chunks
    }
}

/// Cosmetic line-ending cleanup: carriage returns become spaces, doubled newlines collapse.
pub fn normalize(text: &str) -> String {
    text.replace('\r', " ").replace("\n\n", "\n")
}

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("chunk size and step must be positive (size {size}, step {step})")]
    ZeroWindow { size: usize, step: usize },
}
