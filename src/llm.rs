//! Text-generation providers.
//!
//! Implements [`Generator`] for the OpenAI chat completions API and for
//! Ollama's `/api/generate`. `provider = "disabled"` yields a generator that
//! always fails, which keeps index management usable without credentials.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use doc_qa_core::synth::Generator;

use crate::config::LlmConfig;
use crate::embedding::send_with_retry;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Instantiate the generator selected by `config.provider`.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// A generator that refuses every request.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

/// Chat-completions client. The prompt is sent as a single user message.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    api_key: String,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        let request = || {
            self.client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        };
        let json = send_with_retry("OpenAI", self.max_retries, request).await?;
        parse_chat_response(&json)
    }
}

/// Ollama `/api/generate` client with streaming disabled.
pub struct OllamaGenerator {
    model: String,
    temperature: f32,
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: url.trim_end_matches('/').to_string(),
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {"temperature": self.temperature},
        });
        let endpoint = format!("{}/api/generate", self.url);
        let request = || self.client.post(&endpoint).json(&body);
        let json = send_with_retry("Ollama", self.max_retries, request).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response text"))
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}
