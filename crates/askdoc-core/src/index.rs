//! Exact nearest-neighbour index over embedding vectors.
//! Brute-force squared-L2 scan; the corpora here are hundreds to low thousands of items.

use std::cmp::Ordering;

use serde::Serialize;

/// One search hit: the position of the stored vector and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Flat vector index. Vector `i` belongs to the record with id `i`.
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build a fresh index from `vectors`, keeping their order as ids.
    /// All vectors must share one length.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dim = vectors.first().map_or(0, Vec::len);
        if let Some((position, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: v.len(),
                position,
            });
        }
        Ok(Self { dim, vectors })
    }

    /// The `top_k` closest vectors to `query`, nearest first. Ties go to the lower id.
    /// `top_k` is clamped to the index size.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.vectors.is_empty() {
            return Err(IndexError::Empty);
        }
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
                position: 0,
            });
        }
        let mut scored: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| Neighbor {
                id,
                distance: squared_l2(query, v),
            })
            .collect();
        scored.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        scored.truncate(top_k.min(self.vectors.len()));
        Ok(scored)
    }

    /// Vector length shared by every entry (0 for an empty index).
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual} (vector {position})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },
    #[error("the index is empty; build it before searching")]
    Empty,
}
