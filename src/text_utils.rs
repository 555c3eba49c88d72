//! Sentence splitting for narration units.
//!
//! The boundary rule is a punctuation heuristic: one or more of `.`, `!`, `?`
//! followed by whitespace or the end of the text. Abbreviations such as
//! "Dr. Smith" and spaced numbers are split like any other boundary.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?]+)(?:\s+|$)").expect("sentence boundary regex"));

/// Split one paragraph into trimmed, non-empty sentences.
///
/// Text with no terminator comes back as a single sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for caps in RE_SENTENCE_BOUNDARY.captures_iter(text) {
        let (Some(whole), Some(terminators)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_trimmed(&mut sentences, &text[start..terminators.end()]);
        start = whole.end();
    }

    if start < text.len() {
        push_trimmed(&mut sentences, &text[start..]);
    }

    sentences
}

/// Flatten the sentences of every paragraph, preserving order.
pub fn sentences_for<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    paragraphs
        .iter()
        .flat_map(|paragraph| split_sentences(paragraph.as_ref()))
        .collect()
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
