//! Answer synthesis contract.
//!
//! The core owns prompt construction; text generation is delegated to a
//! [`Generator`]. The prompt is deterministic: a fixed instruction preamble,
//! the retrieved context blocks in retrieval order, then the question.
//! Nothing here checks whether the generated answer is grounded.

use anyhow::Result;
use async_trait::async_trait;

/// Instructions placed before the context in every prompt.
pub const INSTRUCTIONS: &str = "You are a helpful AI assistant answering questions based on the provided context.

Use the following pieces of context to answer the question at the end. If you don't know the answer based on the context, just say that you don't know. Don't try to make up an answer.

When answering:
1. Be specific and cite relevant information from the context
2. Keep your answer concise but complete
3. If the context mentions specific policies, prices, or procedures, include them in your answer";

/// A text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-5-nano"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the answering prompt for `question` over `contexts`.
///
/// Context blocks are joined with a blank line, in the order given.
///
/// ```rust
/// use doc_qa_core::synth::build_prompt;
///
/// let prompt = build_prompt("Why?", &["Because.".to_string()]);
/// assert!(prompt.ends_with("Question: Why?\n\nAnswer:"));
/// ```
pub fn build_prompt(question: &str, contexts: &[String]) -> String {
    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\n\nAnswer:",
        INSTRUCTIONS,
        contexts.join("\n\n"),
        question
    )
}

/// Build the prompt and ask `generator` for an answer.
///
/// The generator's output is trimmed of surrounding whitespace and
/// otherwise returned as-is.
pub async fn synthesize<G: Generator + ?Sized>(
    generator: &G,
    question: &str,
    contexts: &[String],
) -> Result<String> {
    let prompt = build_prompt(question, contexts);
    let answer = generator.generate(&prompt).await?;
    Ok(answer.trim().to_string())
}
