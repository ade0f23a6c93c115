use std::fs;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use doc_qa::config::Config;
use doc_qa::pipeline::Pipeline;
use doc_qa::server::run_server;
use doc_qa_core::embedding::HashEmbedder;
use doc_qa_core::synth::Generator;
use serde_json::Value;
use tempfile::TempDir;

struct FixedGenerator(&'static str);

#[async_trait]
impl Generator for FixedGenerator {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.documents = tmp.path().join("documents");
    config.paths.vector_store = tmp.path().join("vector_store");
    config
}

/// Start a server over a pipeline, optionally initialized first.
async fn start(tmp: &TempDir, initialize: bool) -> u16 {
    let config = test_config(tmp);
    fs::create_dir_all(&config.paths.documents).unwrap();
    fs::write(
        config.paths.documents.join("policy.txt"),
        "Returns are accepted within 30 days. Refunds take 5 business days.",
    )
    .unwrap();

    let mut pipeline = Pipeline::new(
        &config,
        Arc::new(HashEmbedder::new(128)),
        Arc::new(FixedGenerator("Returns are accepted within 30 days.")),
    )
    .unwrap();
    if initialize {
        pipeline.initialize(false).await.unwrap();
    }

    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    tokio::spawn(async move {
        run_server(&bind, pipeline).await.ok();
    });
    wait_for_server(port).await;
    port
}

fn multipart_body(boundary: &str, files: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

#[tokio::test]
async fn test_health_and_root() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, true).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["vector_store_initialized"], true);
    assert_eq!(body["total_documents"], 1);

    let body: Value = client
        .get(format!("http://127.0.0.1:{}/", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "doc-qa");
    assert_eq!(body["endpoints"]["ask"], "POST /ask");
}

#[tokio::test]
async fn test_ask_returns_sources_and_highlight() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://127.0.0.1:{}/ask", port))
        .json(&serde_json::json!({"question": "What is the return window?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Returns are accepted within 30 days.");
    assert_eq!(body["sources"], serde_json::json!(["policy.txt"]));
    assert_eq!(
        body["highlighted_answer"],
        "**Returns are accepted within 30 days.**"
    );
}

#[tokio::test]
async fn test_ask_validation() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, true).await;
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/ask", port);

    for question in ["".to_string(), "x".repeat(501)] {
        let resp = client
            .post(&url)
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_uninitialized_pipeline_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, false).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["vector_store_initialized"], false);
    assert_eq!(body["total_documents"], Value::Null);

    let resp = client
        .post(format!("http://127.0.0.1:{}/ask", port))
        .json(&serde_json::json!({"question": "What is the return window?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_initialized");
}

#[tokio::test]
async fn test_upload_then_rebuild() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, true).await;
    let client = reqwest::Client::new();
    let boundary = "docqa-test-boundary";

    let resp = client
        .post(format!("http://127.0.0.1:{}/upload", port))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(multipart_body(
            boundary,
            &[("warranty.md", "All devices carry a one year limited warranty.")],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["files_uploaded"], serde_json::json!(["warranty.md"]));
    assert_eq!(body["total_documents"], 2);
    assert!(tmp.path().join("documents/warranty.md").exists());

    let resp = client
        .post(format!("http://127.0.0.1:{}/rebuild", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total_documents"], 2);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_files() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, true).await;
    let client = reqwest::Client::new();
    let boundary = "docqa-test-boundary";

    let resp = client
        .post(format!("http://127.0.0.1:{}/upload", port))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(multipart_body(
            boundary,
            &[("notes.txt", "fine"), ("scan.pdf", "%PDF-1.4")],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!tmp.path().join("documents/notes.txt").exists());
}

#[tokio::test]
async fn test_upload_before_initialize_saves_nothing() {
    let tmp = TempDir::new().unwrap();
    let port = start(&tmp, false).await;
    let client = reqwest::Client::new();
    let boundary = "docqa-test-boundary";

    let resp = client
        .post(format!("http://127.0.0.1:{}/upload", port))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(multipart_body(
            boundary,
            &[("warranty.md", "All devices carry a one year limited warranty.")],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_initialized");
    assert!(!tmp.path().join("documents/warranty.md").exists());
}
