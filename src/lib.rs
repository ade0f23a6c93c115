//! # doc-qa
//!
//! Retrieval-augmented question answering over a local document corpus.
//!
//! Documents are split into overlapping chunks, embedded, and kept in an
//! in-memory vector index that is persisted as a JSON snapshot. A question
//! is embedded, the nearest chunks are retrieved, and a language model
//! answers from them. Sentences copied from the context are highlighted.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌──────────────┐
//! │  Loader    │──▶│ Chunk + Embed │──▶│ VectorIndex  │──▶ index.json
//! │ .txt / .md │   │               │   │  (cosine)    │
//! └────────────┘   └───────────────┘   └──────┬───────┘
//!                                             │
//!                      question ──▶ Retriever ┘──▶ Generator ──▶ answer
//!                                                               + sources
//!                                                               + highlights
//! ```
//!
//! The pure pieces (chunker, index, snapshot codec, prompt, highlighter)
//! live in [`doc_qa_core`]; this crate adds configuration, providers,
//! persistence, the [`pipeline::Pipeline`] orchestrator, and the CLI and
//! HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`logging`] | Tracing subscriber setup |
//! | [`loader`] | Filesystem document loading |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`llm`] | OpenAI / Ollama text generation |
//! | [`store`] | Index snapshot persistence |
//! | [`retrieve`] | Query embedding + k-NN |
//! | [`pipeline`] | Lifecycle and question answering |
//! | [`server`] | HTTP API |

pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod store;

pub use doc_qa_core::{chunk, highlight, index, models, snapshot, synth};
