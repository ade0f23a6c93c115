use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use doc_qa::config::Config;
use doc_qa::error::{PipelineError, PipelineState};
use doc_qa::llm::DisabledGenerator;
use doc_qa::pipeline::Pipeline;
use doc_qa::store::IndexStore;
use doc_qa_core::embedding::{Embedder, HashEmbedder};
use doc_qa_core::synth::Generator;
use tempfile::TempDir;

// ─── Stubs ──────────────────────────────────────────────────────────

/// Always answers with the same text.
struct FixedGenerator(String);

#[async_trait]
impl Generator for FixedGenerator {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Hash embedder that can be switched into a failing state.
struct FlakyEmbedder {
    inner: HashEmbedder,
    failing: AtomicBool,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> Option<usize> {
        self.inner.dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        self.inner.embed(texts).await
    }
}

/// Reports a model name that does not match its vectors.
struct MislabeledEmbedder {
    name: String,
    inner: HashEmbedder,
}

#[async_trait]
impl Embedder for MislabeledEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> Option<usize> {
        self.inner.dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed(texts).await
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

const POLICY: &str = "Returns are accepted within 30 days. Refunds take 5 business days.";
const GIFT_CARDS: &str = "Gift cards never expire and can be used online.\n\nGift cards are not redeemable for cash at all.";

fn test_config(tmp: &TempDir, chunk_size: usize, chunk_overlap: usize) -> Config {
    let mut config = Config::default();
    config.paths.documents = tmp.path().join("documents");
    config.paths.vector_store = tmp.path().join("vector_store");
    config.chunking.chunk_size = chunk_size;
    config.chunking.chunk_overlap = chunk_overlap;
    config.embedding.provider = "hash".to_string();
    config.embedding.dims = Some(256);
    config.embedding.batch_size = 3;
    config
}

fn write_doc(config: &Config, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(&config.paths.documents).unwrap();
    let path = config.paths.documents.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Ten paragraphs that each become one chunk at `chunk_size = 60`.
fn write_sections(config: &Config) {
    let text = (0..10)
        .map(|i| format!("Section {:02} covers warehouse inventory rules.", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    write_doc(config, "sections.txt", &text);
}

fn pipeline(config: &Config, reply: &str) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(HashEmbedder::new(256)),
        Arc::new(FixedGenerator(reply.to_string())),
    )
    .unwrap()
}

fn outside_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_policy_question_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    let mut p = pipeline(&config, "Returns are accepted within 30 days.");
    assert_eq!(p.state(), PipelineState::Uninitialized);

    let size = p.initialize(false).await.unwrap();
    assert_eq!(size, 1);
    assert_eq!(p.state(), PipelineState::Ready);

    let record = p.ask("What is the return window?").await.unwrap();
    assert_eq!(record.answer, "Returns are accepted within 30 days.");
    assert_eq!(record.sources, vec!["policy.txt".to_string()]);
    assert_eq!(record.contexts, vec![POLICY.to_string()]);
    let highlighted = record.highlighted_answer().unwrap();
    assert!(highlighted.contains("**Returns are accepted within 30 days.**"));

    let status = p.status();
    assert!(status.initialized);
    assert_eq!(status.total_documents, Some(1));
}

#[tokio::test]
async fn test_empty_documents_folder_is_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    fs::create_dir_all(&config.paths.documents).unwrap();
    write_doc(&config, "blank.txt", "   \n\n  ");

    let mut p = pipeline(&config, "unused");
    let err = p.initialize(false).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyCorpus(_)), "got {:?}", err);
    assert_eq!(p.state(), PipelineState::Error);
    assert!(!p.status().initialized);
    assert!(!IndexStore::new(&config.paths.vector_store).exists());
}

#[tokio::test]
async fn test_missing_documents_folder_is_ingestion_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);

    let mut p = pipeline(&config, "unused");
    let err = p.initialize(false).await.unwrap_err();
    assert_eq!(err.kind(), "ingestion_error");
    assert_eq!(p.state(), PipelineState::Error);
}

#[tokio::test]
async fn test_ask_requires_ready() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    let mut p = pipeline(&config, "unused");

    let err = p.ask("anything").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NotInitialized(PipelineState::Uninitialized)
    ));

    let err = p.add_documents(&[]).await.unwrap_err();
    assert_eq!(err.kind(), "not_initialized");

    // A failed initialize leaves the pipeline unusable but recoverable.
    assert!(p.initialize(false).await.is_err());
    let err = p.ask("anything").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotInitialized(PipelineState::Error)));

    write_doc(&config, "policy.txt", POLICY);
    p.initialize(false).await.unwrap();
    assert!(p.ask("return window").await.is_ok());
}

#[tokio::test]
async fn test_add_document_grows_index_from_ten_to_twelve() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_sections(&config);

    let mut p = pipeline(&config, "Gift cards are not redeemable for cash at all.");
    assert_eq!(p.initialize(false).await.unwrap(), 10);

    let incoming = TempDir::new().unwrap();
    let path = outside_file(incoming.path(), "giftcards.txt", GIFT_CARDS);
    let report = p.add_documents(&[path]).await.unwrap();

    assert_eq!(report.total_chunks, 12);
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].source_path, "giftcards.txt");
    assert_eq!(report.added[0].chunks, 2);
    assert!(report.failed.is_empty());
    assert_eq!(p.status().total_documents, Some(12));

    let record = p.ask("Are gift cards redeemable for cash?").await.unwrap();
    assert!(record.sources.contains(&"giftcards.txt".to_string()));

    // The grown index was persisted.
    let snapshot = IndexStore::new(&config.paths.vector_store).load().unwrap();
    assert_eq!(snapshot.index.size(), 12);
}

#[tokio::test]
async fn test_sources_are_deduplicated() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_doc(&config, "giftcards.txt", GIFT_CARDS);

    let mut p = pipeline(&config, "Gift cards never expire.");
    assert_eq!(p.initialize(false).await.unwrap(), 2);

    let record = p.ask("Do gift cards expire?").await.unwrap();
    assert_eq!(record.contexts.len(), 2);
    assert_eq!(record.sources, vec!["giftcards.txt".to_string()]);
}

#[tokio::test]
async fn test_partial_add_reports_failures() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_sections(&config);

    let mut p = pipeline(&config, "unused");
    p.initialize(false).await.unwrap();

    let incoming = TempDir::new().unwrap();
    let good = outside_file(incoming.path(), "giftcards.txt", GIFT_CARDS);
    let pdf = outside_file(incoming.path(), "scan.pdf", "%PDF-1.4");
    let missing = incoming.path().join("missing.md");

    let report = p.add_documents(&[good, pdf, missing]).await.unwrap();
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|e| e.kind() == "ingestion_error"));
    assert_eq!(report.total_chunks, 12);
}

#[tokio::test]
async fn test_add_where_every_file_fails_returns_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_sections(&config);

    let mut p = pipeline(&config, "unused");
    p.initialize(false).await.unwrap();

    let err = p
        .add_documents(&[tmp.path().join("nope.txt")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ingestion_error");
    assert_eq!(p.status().total_documents, Some(10));
    assert_eq!(p.state(), PipelineState::Ready);
}

#[tokio::test]
async fn test_failed_embedding_leaves_index_untouched() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_sections(&config);

    let embedder = Arc::new(FlakyEmbedder {
        inner: HashEmbedder::new(256),
        failing: AtomicBool::new(false),
    });
    let mut p = Pipeline::new(
        &config,
        embedder.clone(),
        Arc::new(FixedGenerator("ok".to_string())),
    )
    .unwrap();
    p.initialize(false).await.unwrap();

    embedder.failing.store(true, Ordering::SeqCst);
    let incoming = TempDir::new().unwrap();
    let path = outside_file(incoming.path(), "giftcards.txt", GIFT_CARDS);
    let err = p.add_documents(&[path]).await.unwrap_err();

    assert!(matches!(err, PipelineError::RemoteCall { .. }));
    assert_eq!(p.status().total_documents, Some(10));
    let snapshot = IndexStore::new(&config.paths.vector_store).load().unwrap();
    assert_eq!(snapshot.index.size(), 10);
}

#[tokio::test]
async fn test_reload_from_snapshot_without_documents() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 60, 0);
    write_sections(&config);

    let mut first = pipeline(&config, "unused");
    first.initialize(false).await.unwrap();
    let before = first.ask("warehouse inventory").await.unwrap();

    fs::remove_dir_all(&config.paths.documents).unwrap();

    let mut second = pipeline(&config, "unused");
    assert_eq!(second.initialize(false).await.unwrap(), 10);
    let after = second.ask("warehouse inventory").await.unwrap();
    assert_eq!(before.contexts, after.contexts);

    // Forcing a rebuild needs the documents again.
    let err = second.initialize(true).await.unwrap_err();
    assert_eq!(err.kind(), "ingestion_error");
    assert_eq!(second.state(), PipelineState::Error);
}

#[tokio::test]
async fn test_corrupt_snapshot_falls_back_to_build() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    let store = IndexStore::new(&config.paths.vector_store);
    fs::create_dir_all(store.root()).unwrap();
    fs::write(store.snapshot_path(), b"not a snapshot").unwrap();

    let mut p = pipeline(&config, "unused");
    assert_eq!(p.initialize(false).await.unwrap(), 1);
    assert!(store.load().is_ok());
}

#[tokio::test]
async fn test_rebuild_picks_up_new_documents() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    let mut p = pipeline(&config, "unused");
    assert_eq!(p.initialize(false).await.unwrap(), 1);

    write_doc(&config, "giftcards.txt", GIFT_CARDS);
    assert_eq!(p.rebuild().await.unwrap(), 2);
    assert_eq!(p.state(), PipelineState::Ready);
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    let mut p = pipeline(&config, "Returns are accepted within 30 days.");
    p.initialize(false).await.unwrap();

    fs::remove_dir_all(&config.paths.documents).unwrap();
    let err = p.rebuild().await.unwrap_err();
    assert_eq!(err.kind(), "ingestion_error");
    assert_eq!(p.state(), PipelineState::Ready);

    let record = p.ask("What is the return window?").await.unwrap();
    assert_eq!(record.sources, vec!["policy.txt".to_string()]);
}

#[tokio::test]
async fn test_changed_embedding_model_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    pipeline(&config, "unused").initialize(false).await.unwrap();

    let mut other = Pipeline::new(
        &config,
        Arc::new(HashEmbedder::new(64)),
        Arc::new(FixedGenerator("unused".to_string())),
    )
    .unwrap();
    let err = other.initialize(false).await.unwrap_err();
    assert!(
        matches!(err, PipelineError::EmbeddingModelMismatch { .. }),
        "got {:?}",
        err
    );

    let mut relabeled = Pipeline::new(
        &config,
        Arc::new(MislabeledEmbedder {
            name: "hash-256".to_string(),
            inner: HashEmbedder::new(64),
        }),
        Arc::new(FixedGenerator("unused".to_string())),
    )
    .unwrap();
    let err = relabeled.initialize(false).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DimensionMismatch {
            expected: 256,
            found: 64
        }
    ));

    // A forced rebuild is the way out.
    assert_eq!(other.initialize(true).await.unwrap(), 1);
}

#[tokio::test]
async fn test_generator_failure_is_remote_call_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 1000, 200);
    write_doc(&config, "policy.txt", POLICY);

    let mut p = Pipeline::new(
        &config,
        Arc::new(HashEmbedder::new(256)),
        Arc::new(DisabledGenerator),
    )
    .unwrap();
    p.initialize(false).await.unwrap();

    let err = p.ask("What is the return window?").await.unwrap_err();
    assert_eq!(err.kind(), "remote_call_error");
    assert!(err.to_string().contains("generating answer"));
}

#[test]
fn test_invalid_chunking_is_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, 100, 100);
    let err = Pipeline::new(
        &config,
        Arc::new(HashEmbedder::new(8)),
        Arc::new(DisabledGenerator),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), "configuration_error");
}
