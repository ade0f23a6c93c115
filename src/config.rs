//! TOML configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! [`load_config`] parses and validates a file, [`Config::validate`] can be
//! used on configs built in code.
//!
//! ```toml
//! [paths]
//! documents = "./documents"
//! vector_store = "./vector_store"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! k = 4
//!
//! [embedding]
//! provider = "openai"        # openai | ollama | hash
//! model = "text-embedding-ada-002"
//!
//! [llm]
//! provider = "openai"        # openai | ollama | disabled
//! model = "gpt-5-nano"
//!
//! [server]
//! bind = "0.0.0.0:8000"
//! ```
//!
//! `DOCQA_DOCUMENTS_PATH` and `DOCQA_VECTOR_STORE_PATH` override the paths.
//! API credentials are read from the environment (`OPENAI_API_KEY`), never
//! from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_documents_path")]
    pub documents: PathBuf,
    #[serde(default = "default_vector_store_path")]
    pub vector_store: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents: default_documents_path(),
            vector_store: default_vector_store_path(),
        }
    }
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("./documents")
}
fn default_vector_store_path() -> PathBuf {
    PathBuf::from("./vector_store")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            url: None,
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-5-nano".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rolling log files; stdout only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Check cross-field constraints. Violations are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.k == 0 {
            bail!("retrieval.k must be >= 1");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }
        match self.embedding.provider.as_str() {
            "openai" | "ollama" => {}
            "hash" => {
                if self.embedding.dims.unwrap_or(0) == 0 {
                    bail!("embedding.dims must be > 0 when provider is 'hash'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, or hash.",
                other
            ),
        }

        match self.llm.provider.as_str() {
            "openai" | "ollama" | "disabled" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be openai, ollama, or disabled.",
                other
            ),
        }

        Ok(())
    }

    /// Apply `DOCQA_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DOCQA_DOCUMENTS_PATH") {
            self.paths.documents = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("DOCQA_VECTOR_STORE_PATH") {
            self.paths.vector_store = PathBuf::from(path);
        }
    }
}

/// Read, parse, and validate a configuration file.
///
/// A missing file yields the defaults, matching an environment-only setup.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::default()
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}
