//! Self-describing serialization of a [`VectorIndex`].
//!
//! A snapshot is a JSON document tagged with a format name and version, the
//! embedding model that produced the vectors, and the dimensionality. Vectors
//! are stored as base64 of little-endian `f32` bytes so a decoded index is
//! bit-identical to the encoded one and answers every search identically.
//!
//! ```json
//! {
//!   "format": "doc-qa-index",
//!   "version": 1,
//!   "embedding_model": "text-embedding-ada-002",
//!   "dims": 1536,
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "entries": [
//!     { "content": "...", "source_path": "policy.txt", "sequence_index": 0,
//!       "start_offset": 0, "vector": "AACAPwAAAEA=" }
//!   ]
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::index::{IndexError, VectorIndex};
use crate::models::Chunk;

pub const SNAPSHOT_FORMAT: &str = "doc-qa-index";
pub const SNAPSHOT_VERSION: u32 = 1;

/// Reasons a byte string is not a usable snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unrecognized snapshot format '{0}'")]
    UnknownFormat(String),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("entry {entry}: invalid vector encoding")]
    BadVector { entry: usize },
    #[error("snapshot content is inconsistent: {0}")]
    Inconsistent(#[from] IndexError),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format: String,
    version: u32,
    embedding_model: String,
    dims: usize,
    created_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    #[serde(flatten)]
    chunk: Chunk,
    vector: String,
}

/// A decoded snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: VectorIndex,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

/// Serialize `index` together with the model that produced its vectors.
pub fn encode(index: &VectorIndex, embedding_model: &str) -> Result<Vec<u8>, SnapshotError> {
    let file = SnapshotFile {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        embedding_model: embedding_model.to_string(),
        dims: index.dims(),
        created_at: Utc::now(),
        entries: index
            .iter()
            .map(|(chunk, vector)| SnapshotEntry {
                chunk: chunk.clone(),
                vector: STANDARD.encode(vec_to_blob(vector)),
            })
            .collect(),
    };
    Ok(serde_json::to_vec(&file)?)
}

/// Parse and validate a snapshot.
///
/// Rejects foreign formats, unknown versions, undecodable vectors, empty
/// snapshots, and vectors that disagree with the recorded dimensionality.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, SnapshotError> {
    let file: SnapshotFile = serde_json::from_slice(bytes)?;
    if file.format != SNAPSHOT_FORMAT {
        return Err(SnapshotError::UnknownFormat(file.format));
    }
    if file.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(file.version));
    }

    let mut chunks = Vec::with_capacity(file.entries.len());
    let mut vectors = Vec::with_capacity(file.entries.len());
    for (i, entry) in file.entries.into_iter().enumerate() {
        let blob = STANDARD
            .decode(entry.vector.as_bytes())
            .map_err(|_| SnapshotError::BadVector { entry: i })?;
        if blob.len() % 4 != 0 {
            return Err(SnapshotError::BadVector { entry: i });
        }
        let vector = blob_to_vec(&blob);
        if vector.len() != file.dims {
            return Err(IndexError::DimensionMismatch {
                expected: file.dims,
                found: vector.len(),
            }
            .into());
        }
        chunks.push(entry.chunk);
        vectors.push(vector);
    }

    Ok(Snapshot {
        index: VectorIndex::build(chunks, vectors)?,
        embedding_model: file.embedding_model,
        created_at: file.created_at,
    })
}
