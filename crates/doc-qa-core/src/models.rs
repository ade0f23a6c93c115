//! Core data models used throughout doc-qa.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and answering pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A loaded source file. Identity is its `source_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Path used for attribution (relative to the documents root when possible).
    pub source_path: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(source_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A bounded segment of a document's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_path: String,
    /// Position within the parent document, contiguous from 0.
    pub sequence_index: usize,
    /// Byte offset of `content` inside the parent document's content.
    pub start_offset: usize,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`, higher is more relevant.
    pub score: f32,
}
