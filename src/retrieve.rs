//! Query-side retrieval: embed the question, then k-NN over the index.

use std::sync::Arc;

use doc_qa_core::embedding::Embedder;
use doc_qa_core::index::VectorIndex;
use doc_qa_core::models::ScoredChunk;
use tracing::debug;

use crate::error::PipelineError;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { embedder, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Return up to `k` chunks from `index`, most similar first.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        question: &str,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if index.is_empty() {
            return Err(PipelineError::EmptyIndex);
        }

        let query = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| PipelineError::remote("embedding question", e))?;

        let results = index.search(&query, self.k)?;
        debug!(
            k = self.k,
            hits = results.len(),
            top_score = results.first().map(|r| r.score),
            "retrieved chunks"
        );
        Ok(results)
    }
}
