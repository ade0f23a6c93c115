//! # doc-qa Core
//!
//! Pure logic for doc-qa: data models, chunking, the vector index and its
//! snapshot codec, the embedding and generation traits, the answer prompt
//! contract, and answer highlighting.
//!
//! This crate contains no tokio, filesystem I/O, or network code. Remote
//! capabilities are reached only through the [`embedding::Embedder`] and
//! [`synth::Generator`] traits, which the application crate implements.

pub mod chunk;
pub mod embedding;
pub mod highlight;
pub mod index;
pub mod models;
pub mod snapshot;
pub mod synth;
