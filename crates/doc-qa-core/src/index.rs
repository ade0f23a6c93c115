//! In-memory flat vector index.
//!
//! Stores `(Chunk, vector)` pairs and answers k-nearest-neighbor queries by
//! brute-force cosine similarity over every stored vector. The index only
//! grows: entries can be appended with [`VectorIndex::insert`] but never
//! removed. A forced rebuild replaces the whole index.
//!
//! All vectors in one index share a dimensionality fixed at build time.
//! Vectors of any other length are rejected, never truncated or padded.

use thiserror::Error;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("cannot build an index from zero chunks")]
    EmptyInput,
    #[error("index is empty")]
    EmptyIndex,
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("got {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },
    #[error("embedding vectors must not be empty")]
    ZeroDimension,
}

#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A searchable set of chunk embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from parallel arrays of chunks and vectors.
    ///
    /// # Errors
    ///
    /// - [`IndexError::EmptyInput`] when `chunks` is empty.
    /// - [`IndexError::LengthMismatch`] when the arrays differ in length.
    /// - [`IndexError::ZeroDimension`] when vectors are empty.
    /// - [`IndexError::DimensionMismatch`] when vectors differ in length.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        let dims = vectors.first().map(Vec::len).unwrap_or_default();
        if dims == 0 && !vectors.is_empty() {
            return Err(IndexError::ZeroDimension);
        }

        let mut index = Self {
            dims,
            entries: Vec::with_capacity(chunks.len()),
        };
        index.insert(chunks, vectors)?;
        Ok(index)
    }

    /// Append chunks without rebuilding.
    ///
    /// The batch is validated in full before anything is appended, so a
    /// rejected batch leaves the index untouched. Existing entries keep
    /// their positions, which keeps tie-breaking stable.
    pub fn insert(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                found: bad.len(),
            });
        }

        self.entries.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector }),
        );
        Ok(())
    }

    /// Return up to `k` chunks ranked by cosine similarity (descending).
    ///
    /// Ties keep insertion order. Returns every entry when the index holds
    /// fewer than `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Number of indexed chunks.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality shared by every vector in the index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Iterate over `(chunk, vector)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, &[f32])> {
        self.entries.iter().map(|e| (&e.chunk, e.vector.as_slice()))
    }

    /// Distinct source paths, in first-seen order.
    pub fn source_paths(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for e in &self.entries {
            if !seen.contains(&e.chunk.source_path.as_str()) {
                seen.push(&e.chunk.source_path);
            }
        }
        seen
    }
}
