//! The question-answering pipeline.
//!
//! [`Pipeline`] owns the vector index and drives its lifecycle:
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──▶ Ready ◀──▶ Rebuilding
//!                                    │
//!                                    └──▶ Error ──initialize──▶ …
//! ```
//!
//! `initialize` loads the persisted snapshot when there is one, otherwise it
//! reads the documents directory, chunks, embeds, builds, and persists.
//! `ask` is read-only and takes `&self`; everything that changes the index
//! takes `&mut self`, so the hosting layer decides how to serialize writers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use doc_qa_core::chunk::Chunker;
use doc_qa_core::embedding::Embedder;
use doc_qa_core::highlight::highlighted_or_none;
use doc_qa_core::index::{IndexError, VectorIndex};
use doc_qa_core::models::Chunk;
use doc_qa_core::synth::{synthesize, Generator};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{PipelineError, PipelineState};
use crate::llm::create_generator;
use crate::loader;
use crate::retrieve::Retriever;
use crate::store::IndexStore;

/// Longest question accepted by [`validate_question`], in characters.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Result of [`Pipeline::ask`].
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub answer: String,
    /// Distinct source paths of the retrieved chunks, sorted.
    pub sources: Vec<String>,
    /// Retrieved chunk texts in retrieval order.
    pub contexts: Vec<String>,
}

impl AnswerRecord {
    /// The answer with context sentences wrapped in `**`, or `None` when
    /// nothing in the answer came from the context.
    pub fn highlighted_answer(&self) -> Option<String> {
        highlighted_or_none(&self.answer, &self.contexts)
    }
}

/// A file accepted by [`Pipeline::add_documents`].
#[derive(Debug, Clone, Serialize)]
pub struct AddedFile {
    pub source_path: String,
    pub chunks: usize,
}

/// Outcome of [`Pipeline::add_documents`].
#[derive(Debug)]
pub struct AddReport {
    pub added: Vec<AddedFile>,
    /// Per-file failures; these files contributed nothing to the index.
    pub failed: Vec<PipelineError>,
    /// Index size after the call.
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: String,
    pub initialized: bool,
    /// Number of indexed chunks; `None` unless ready.
    pub total_documents: Option<usize>,
}

/// Check that a question is non-blank and at most [`MAX_QUESTION_CHARS`].
pub fn validate_question(question: &str) -> Result<(), String> {
    if question.trim().is_empty() {
        return Err("question must not be empty".to_string());
    }
    let chars = question.chars().count();
    if chars > MAX_QUESTION_CHARS {
        return Err(format!(
            "question is {} characters long; the limit is {}",
            chars, MAX_QUESTION_CHARS
        ));
    }
    Ok(())
}

pub struct Pipeline {
    state: PipelineState,
    index: Option<VectorIndex>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    retriever: Retriever,
    store: IndexStore,
    documents_path: PathBuf,
    batch_size: usize,
}

impl Pipeline {
    /// Assemble a pipeline around explicit providers.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        if config.retrieval.k == 0 {
            return Err(PipelineError::Configuration(
                "retrieval.k must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            state: PipelineState::Uninitialized,
            index: None,
            chunker,
            retriever: Retriever::new(embedder.clone(), config.retrieval.k),
            embedder,
            generator,
            store: IndexStore::new(&config.paths.vector_store),
            documents_path: config.paths.documents.clone(),
            batch_size: config.embedding.batch_size.max(1),
        })
    }

    /// Assemble a pipeline with the providers named in `config`.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let embedder = create_embedder(&config.embedding)
            .map_err(|e| PipelineError::Configuration(format!("{:#}", e)))?;
        let generator = create_generator(&config.llm)
            .map_err(|e| PipelineError::Configuration(format!("{:#}", e)))?;
        Self::new(config, embedder, generator)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn documents_path(&self) -> &Path {
        &self.documents_path
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn status(&self) -> Status {
        let total_documents = match (self.state, &self.index) {
            (PipelineState::Ready, Some(index)) => Some(index.size()),
            _ => None,
        };
        Status {
            state: self.state.to_string(),
            initialized: total_documents.is_some(),
            total_documents,
        }
    }

    /// Bring the pipeline to `Ready`.
    ///
    /// Loads the persisted index unless `force_rebuild` is set or there is
    /// none; an unreadable snapshot falls back to a fresh build. On failure
    /// the pipeline is left in `Error` with no index. Returns the index size.
    pub async fn initialize(&mut self, force_rebuild: bool) -> Result<usize, PipelineError> {
        info!(
            force_rebuild,
            from = %self.state,
            documents = %self.documents_path.display(),
            store = %self.store.root().display(),
            "initializing pipeline"
        );
        self.state = PipelineState::Initializing;

        let result = if force_rebuild {
            self.build_fresh().await
        } else {
            self.load_or_build().await
        };

        match result {
            Ok(index) => {
                let size = index.size();
                self.index = Some(index);
                self.state = PipelineState::Ready;
                info!(chunks = size, "pipeline ready");
                Ok(size)
            }
            Err(e) => {
                self.index = None;
                self.state = PipelineState::Error;
                warn!(error = %e, "pipeline initialization failed");
                Err(e)
            }
        }
    }

    /// Rebuild the index from the documents directory.
    ///
    /// From `Ready`, a failed rebuild keeps the previous index live and
    /// returns to `Ready`. From any other state this is
    /// `initialize(true)`.
    pub async fn rebuild(&mut self) -> Result<usize, PipelineError> {
        if self.state != PipelineState::Ready {
            return self.initialize(true).await;
        }

        info!("rebuilding index");
        self.state = PipelineState::Rebuilding;
        let result = self.build_fresh().await;
        self.state = PipelineState::Ready;

        match result {
            Ok(index) => {
                let size = index.size();
                self.index = Some(index);
                info!(chunks = size, "rebuild complete");
                Ok(size)
            }
            Err(e) => {
                warn!(error = %e, "rebuild failed; keeping previous index");
                Err(e)
            }
        }
    }

    /// Answer `question` from the indexed corpus.
    pub async fn ask(&self, question: &str) -> Result<AnswerRecord, PipelineError> {
        let index = self.ready_index()?;

        let results = self.retriever.retrieve(index, question).await?;
        let contexts: Vec<String> = results.iter().map(|r| r.chunk.content.clone()).collect();
        let sources: Vec<String> = results
            .iter()
            .map(|r| r.chunk.source_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let answer = synthesize(self.generator.as_ref(), question, &contexts)
            .await
            .map_err(|e| PipelineError::remote("generating answer", e))?;

        info!(
            contexts = contexts.len(),
            sources = sources.len(),
            "answered question"
        );
        Ok(AnswerRecord {
            answer,
            sources,
            contexts,
        })
    }

    /// Ingest additional files into the live index.
    ///
    /// Files that cannot be read or yield no text are reported in
    /// [`AddReport::failed`] and skipped. The remaining chunks are embedded
    /// and inserted into a copy of the index, which is persisted before it
    /// replaces the live one; an embedding or storage failure changes
    /// nothing. When every file fails, the first failure is returned.
    pub async fn add_documents(&mut self, paths: &[PathBuf]) -> Result<AddReport, PipelineError> {
        let current = self.ready_index()?;

        let mut added = Vec::new();
        let mut failed = Vec::new();
        let mut new_chunks: Vec<Chunk> = Vec::new();

        for path in paths {
            let doc = match loader::load_file(path, &self.documents_path) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(error = %e, "skipping file");
                    failed.push(e);
                    continue;
                }
            };
            let chunks = self.chunker.split_document(&doc);
            if chunks.is_empty() {
                let e = PipelineError::ingestion(path, "file has no text content");
                warn!(error = %e, "skipping file");
                failed.push(e);
                continue;
            }
            debug!(source = %doc.source_path, chunks = chunks.len(), "chunked file");
            added.push(AddedFile {
                source_path: doc.source_path.clone(),
                chunks: chunks.len(),
            });
            new_chunks.extend(chunks);
        }

        if added.is_empty() {
            if let Some(first) = failed.into_iter().next() {
                return Err(first);
            }
            return Ok(AddReport {
                added,
                failed: Vec::new(),
                total_chunks: current.size(),
            });
        }

        let vectors = self.embed_chunks(&new_chunks).await?;
        let mut staged = current.clone();
        staged.insert(new_chunks, vectors)?;
        self.store.save(&staged, self.embedder.model_name())?;

        let total_chunks = staged.size();
        self.index = Some(staged);
        info!(
            added = added.len(),
            failed = failed.len(),
            total_chunks,
            "added documents"
        );

        Ok(AddReport {
            added,
            failed,
            total_chunks,
        })
    }

    fn ready_index(&self) -> Result<&VectorIndex, PipelineError> {
        match (&self.index, self.state) {
            (Some(index), PipelineState::Ready) => Ok(index),
            _ => Err(PipelineError::NotInitialized(self.state)),
        }
    }

    async fn load_or_build(&self) -> Result<VectorIndex, PipelineError> {
        if !self.store.exists() {
            return self.build_fresh().await;
        }

        match self.store.load() {
            Ok(snapshot) => {
                let configured = self.embedder.model_name();
                if snapshot.embedding_model != configured {
                    return Err(PipelineError::EmbeddingModelMismatch {
                        stored: snapshot.embedding_model,
                        configured: configured.to_string(),
                    });
                }
                if let Some(dims) = self.embedder.dims() {
                    if dims != snapshot.index.dims() {
                        return Err(PipelineError::DimensionMismatch {
                            expected: snapshot.index.dims(),
                            found: dims,
                        });
                    }
                }
                info!(
                    chunks = snapshot.index.size(),
                    created_at = %snapshot.created_at,
                    "loaded existing index"
                );
                Ok(snapshot.index)
            }
            Err(e @ PipelineError::StorageNotFound { .. }) => {
                warn!(error = %e, "stored index unusable; rebuilding from documents");
                self.build_fresh().await
            }
            Err(e) => Err(e),
        }
    }

    async fn build_fresh(&self) -> Result<VectorIndex, PipelineError> {
        let documents = loader::load_directory(&self.documents_path)?;
        if documents.is_empty() {
            return Err(PipelineError::EmptyCorpus(self.documents_path.clone()));
        }

        let chunks = self.chunker.split(&documents);
        if chunks.is_empty() {
            return Err(PipelineError::EmptyCorpus(self.documents_path.clone()));
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents"
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let index = VectorIndex::build(chunks, vectors)?;
        self.store.save(&index, self.embedder.model_name())?;
        Ok(index)
    }

    /// Embed chunk texts in batches, checking the provider returned one
    /// vector per text of the expected length.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self
                .embedder
                .embed(batch)
                .await
                .map_err(|e| PipelineError::remote("embedding documents", e))?;
            if embedded.len() != batch.len() {
                return Err(IndexError::LengthMismatch {
                    chunks: batch.len(),
                    vectors: embedded.len(),
                }
                .into());
            }
            debug!(batch = i, size = batch.len(), "embedded batch");
            vectors.extend(embedded);
        }

        if let (Some(expected), Some(first)) = (self.embedder.dims(), vectors.first()) {
            if first.len() != expected {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    found: first.len(),
                });
            }
        }

        Ok(vectors)
    }
}
