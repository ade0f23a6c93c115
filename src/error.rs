//! Error taxonomy for pipeline operations.
//!
//! Every failure the pipeline can report is a distinct [`PipelineError`]
//! variant, so callers (CLI, HTTP layer) can branch on the kind without
//! inspecting messages. [`PipelineError::kind`] gives a stable code for
//! serialization.

use std::fmt;
use std::path::PathBuf;

use doc_qa_core::index::IndexError;
use thiserror::Error;

/// Lifecycle states of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initializing,
    Ready,
    Rebuilding,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Rebuilding => "rebuilding",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("ingestion failed for {}: {reason}", path.display())]
    Ingestion { path: PathBuf, reason: String },

    #[error("no documents or chunks found under {}", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("the vector index is empty")]
    EmptyIndex,

    #[error(
        "embedding dimension mismatch: index expects {expected}, got {found} (rebuild the index after changing embedding models)"
    )]
    DimensionMismatch { expected: usize, found: usize },

    #[error(
        "index was built with embedding model '{stored}' but '{configured}' is configured (rebuild the index)"
    )]
    EmbeddingModelMismatch { stored: String, configured: String },

    #[error("no valid index at {}: {reason}", path.display())]
    StorageNotFound { path: PathBuf, reason: String },

    #[error("failed to write index to {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed: {source:#}")]
    RemoteCall {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("pipeline is not initialized (state: {0})")]
    NotInitialized(PipelineState),
}

impl PipelineError {
    /// Stable, machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Ingestion { .. } => "ingestion_error",
            Self::EmptyCorpus(_) => "empty_corpus",
            Self::EmptyIndex => "empty_index",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmbeddingModelMismatch { .. } => "embedding_model_mismatch",
            Self::StorageNotFound { .. } => "storage_not_found",
            Self::Storage { .. } => "storage_error",
            Self::RemoteCall { .. } => "remote_call_error",
            Self::NotInitialized(_) => "not_initialized",
        }
    }

    pub(crate) fn remote(step: &'static str, source: anyhow::Error) -> Self {
        Self::RemoteCall { step, source }
    }

    pub(crate) fn ingestion(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Ingestion {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::EmptyIndex => Self::EmptyIndex,
            IndexError::EmptyInput => {
                Self::Configuration("cannot build an index from zero chunks".to_string())
            }
            IndexError::DimensionMismatch { expected, found } => {
                Self::DimensionMismatch { expected, found }
            }
            IndexError::LengthMismatch { chunks, vectors } => Self::RemoteCall {
                step: "embedding",
                source: anyhow::anyhow!(
                    "embedding service returned {} vectors for {} texts",
                    vectors,
                    chunks
                ),
            },
            IndexError::ZeroDimension => Self::RemoteCall {
                step: "embedding",
                source: anyhow::anyhow!("embedding service returned empty vectors"),
            },
        }
    }
}
