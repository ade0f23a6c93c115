//! On-disk persistence of the vector index.
//!
//! The index lives in a single snapshot file, `index.json`, inside the
//! configured vector-store directory. Saves go through a temporary file and
//! a rename, so a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use doc_qa_core::index::VectorIndex;
use doc_qa_core::snapshot::{self, Snapshot};
use tracing::debug;

use crate::error::PipelineError;

const SNAPSHOT_FILE: &str = "index.json";
const TEMP_FILE: &str = "index.json.tmp";

/// Location of a persisted index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// Whether a snapshot file is present. Says nothing about its validity.
    pub fn exists(&self) -> bool {
        self.snapshot_path().is_file()
    }

    /// Persist `index`, replacing any previous snapshot.
    pub fn save(&self, index: &VectorIndex, embedding_model: &str) -> Result<(), PipelineError> {
        let bytes = snapshot::encode(index, embedding_model).map_err(|e| PipelineError::Storage {
            path: self.snapshot_path(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        std::fs::create_dir_all(&self.root).map_err(|source| PipelineError::Storage {
            path: self.root.clone(),
            source,
        })?;

        let tmp = self.root.join(TEMP_FILE);
        std::fs::write(&tmp, &bytes).map_err(|source| PipelineError::Storage {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, self.snapshot_path()).map_err(|source| PipelineError::Storage {
            path: self.snapshot_path(),
            source,
        })?;

        debug!(
            path = %self.snapshot_path().display(),
            entries = index.size(),
            bytes = bytes.len(),
            "saved index snapshot"
        );
        Ok(())
    }

    /// Load the persisted snapshot.
    ///
    /// A missing, unreadable, or undecodable file is reported as
    /// [`PipelineError::StorageNotFound`].
    pub fn load(&self) -> Result<Snapshot, PipelineError> {
        let path = self.snapshot_path();
        let bytes = std::fs::read(&path).map_err(|e| PipelineError::StorageNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let snapshot = snapshot::decode(&bytes).map_err(|e| PipelineError::StorageNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %path.display(),
            entries = snapshot.index.size(),
            model = %snapshot.embedding_model,
            "loaded index snapshot"
        );
        Ok(snapshot)
    }
}
