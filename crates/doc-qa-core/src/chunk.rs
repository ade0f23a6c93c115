//! Recursive, overlap-aware text chunker.
//!
//! Splits document content into [`Chunk`]s of at most `chunk_size`
//! characters. Splitting prefers coarse boundaries (paragraphs) and only
//! falls back to finer ones (lines, words, characters) for segments that are
//! still too long.
//!
//! # Algorithm
//!
//! 1. Decompose the text into *pieces*: contiguous spans that partition the
//!    document. At each level the first separator of
//!    `["\n\n", "\n", " ", ""]` present in the span is used, and the separator
//!    stays attached to the end of the span it terminates.
//! 2. Any piece longer than `chunk_size` is decomposed again with the
//!    remaining, finer separators. The empty separator splits at character
//!    boundaries, so decomposition always terminates.
//! 3. Merge pieces greedily into windows of at most `chunk_size` characters.
//!    When the next piece does not fit, emit the window, then drop pieces
//!    from its front until the retained tail is at most `overlap` characters
//!    and leaves room for the next piece.
//! 4. Each emitted window becomes a chunk whose content is the exact
//!    substring it covers, so chunks de-overlapped by `start_offset`
//!    reconstruct the document byte for byte.
//!
//! # Example
//!
//! ```rust
//! use doc_qa_core::chunk::Chunker;
//! use doc_qa_core::models::Document;
//!
//! let chunker = Chunker::new(1000, 200).unwrap();
//! let doc = Document::new("notes.md", "Hello world.\n\nSecond paragraph.");
//! let chunks = chunker.split_document(&doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].sequence_index, 0);
//! ```

use std::collections::VecDeque;

use thiserror::Error;

use crate::models::{Chunk, Document};

/// Separators tried in priority order, coarsest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Invalid chunker parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkConfigError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Splits documents into overlapping chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// A contiguous span of the document being chunked.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Fails when `chunk_size` is zero or `overlap >= chunk_size`; either
    /// would stop the merge step from making progress.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split every document, concatenating the chunks in document order.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect()
    }

    /// Split one document into chunks with `sequence_index` starting at 0.
    ///
    /// Empty and whitespace-only documents produce no chunks.
    pub fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.content.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.collect_pieces(text, 0, &SEPARATORS, &mut pieces);

        self.merge(&pieces)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, (start, end))| Chunk {
                content: text[start..end].to_string(),
                source_path: doc.source_path.clone(),
                sequence_index,
                start_offset: start,
            })
            .collect()
    }

    /// Decompose `text` (located at byte `base` of the document) into pieces
    /// no longer than `chunk_size`, recursing with finer separators.
    fn collect_pieces(&self, text: &str, base: usize, separators: &[&str], out: &mut Vec<Piece>) {
        let Some(idx) = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
        else {
            out.push(Piece {
                start: base,
                end: base + text.len(),
                chars: text.chars().count(),
            });
            return;
        };
        let finer = &separators[idx + 1..];

        for (start, end) in split_keep_separator(text, separators[idx]) {
            let span = &text[start..end];
            let chars = span.chars().count();
            if chars > self.chunk_size && !finer.is_empty() {
                self.collect_pieces(span, base + start, finer, out);
            } else {
                out.push(Piece {
                    start: base + start,
                    end: base + end,
                    chars,
                });
            }
        }
    }

    /// Merge pieces into overlapping windows, returned as byte ranges.
    fn merge(&self, pieces: &[Piece]) -> Vec<(usize, usize)> {
        let mut windows = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                windows.push(window_span(&window));
                while total > self.overlap || (total > 0 && total + piece.chars > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += piece.chars;
        }

        if !window.is_empty() {
            windows.push(window_span(&window));
        }

        windows
    }
}

fn window_span(window: &VecDeque<Piece>) -> (usize, usize) {
    let start = window.front().map(|p| p.start).unwrap_or_default();
    let end = window.back().map(|p| p.end).unwrap_or(start);
    (start, end)
}

/// Split after each occurrence of `sep`, keeping the separator at the end of
/// the span it terminates. The empty separator splits at every character.
fn split_keep_separator(text: &str, sep: &str) -> Vec<(usize, usize)> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| (i, i + c.len_utf8()))
            .collect();
    }

    let mut spans = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(sep) {
        let end = pos + sep.len();
        spans.push((start, end));
        start = end;
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}
