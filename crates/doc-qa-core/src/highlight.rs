//! Answer highlighting.
//!
//! Marks the parts of a generated answer that were copied verbatim from the
//! retrieved context. Each context is split into sentence-like units at
//! `.`, `!` or `?` followed by whitespace; every trimmed unit longer than
//! [`MIN_SENTENCE_CHARS`] characters that occurs in the answer has all of its
//! occurrences wrapped in `**`.
//!
//! Matching is tested against the original answer, but replacements are
//! applied to the progressively highlighted text in context-then-sentence
//! order. A unit contained in an already highlighted one is therefore wrapped
//! again inside it, producing nested markers.

/// Units must be strictly longer than this many characters to be highlighted.
pub const MIN_SENTENCE_CHARS: usize = 20;

const EMPHASIS: &str = "**";

/// Wrap context sentences found in `answer` in emphasis markers.
///
/// Returns `answer` unchanged when nothing matched.
pub fn highlight(answer: &str, contexts: &[String]) -> String {
    let mut highlighted = answer.to_string();

    for context in contexts {
        for sentence in split_sentences(context) {
            let clean = sentence.trim();
            if clean.chars().count() > MIN_SENTENCE_CHARS && answer.contains(clean) {
                highlighted =
                    highlighted.replace(clean, &format!("{}{}{}", EMPHASIS, clean, EMPHASIS));
            }
        }
    }

    highlighted
}

/// Like [`highlight`], but `None` when no sentence matched.
pub fn highlighted_or_none(answer: &str, contexts: &[String]) -> Option<String> {
    let highlighted = highlight(answer, contexts);
    (highlighted != answer).then_some(highlighted)
}

/// Split at sentence punctuation followed by whitespace. The punctuation
/// stays with its sentence; the whitespace run is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let mut next_start = end;
        while let Some(&(j, n)) = chars.peek() {
            if !n.is_whitespace() {
                break;
            }
            next_start = j + n.len_utf8();
            chars.next();
        }
        if next_start > end {
            sentences.push(&text[start..end]);
            start = next_start;
        }
    }
    sentences.push(&text[start..]);
    sentences
}
