//! Query and document tokenizers.
//!
//! The default [`Tokenizer::Whitespace`] lowercases and splits on Unicode
//! whitespace, nothing more: punctuation stays attached to words and there is
//! no stemming or stop-word removal. [`Tokenizer::Alphanumeric`] is an opt-in
//! upgrade that splits on non-alphanumeric characters and drops stop words and
//! single-character tokens; switching to it changes every BM25 score.
//!
//! Both produce a [`Tokens`] value with one heap allocation (the lowercased
//! buffer) and byte spans into it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Tokenization policy applied to both the corpus and the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tokenizer {
    /// Lowercase, split on whitespace.
    #[default]
    Whitespace,
    /// Lowercase, split on non-alphanumeric, remove stop words and 1-char tokens.
    Alphanumeric,
}

impl Tokenizer {
    /// Tokenize `text` according to this policy.
    pub fn tokenize(&self, text: &str) -> Tokens {
        match self {
            Tokenizer::Whitespace => tokenize_whitespace(text),
            Tokenizer::Alphanumeric => tokenize_alphanumeric(text),
        }
    }
}

/// Tokenized text: owns the lowercased buffer, provides &str slices via byte spans.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>, // (start, end) byte offsets into buffer
}

impl Tokens {
    /// Returns an iterator over the token `&str` slices.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Tokenize with the default whitespace policy.
pub fn tokenize(text: &str) -> Tokens {
    Tokenizer::default().tokenize(text)
}

fn tokenize_whitespace(text: &str) -> Tokens {
    split_spans(text.to_lowercase(), |c| !c.is_whitespace(), |_| true)
}

fn tokenize_alphanumeric(text: &str) -> Tokens {
    split_spans(text.to_lowercase(), char::is_alphanumeric, |token| {
        token.len() > 1 && !STOP_WORDS.contains(token)
    })
}

/// Collect maximal runs of characters satisfying `in_token`, keeping those `keep` accepts.
fn split_spans(
    buffer: String,
    in_token: impl Fn(char) -> bool,
    keep: impl Fn(&str) -> bool,
) -> Tokens {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in buffer.char_indices() {
        if in_token(c) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            if keep(&buffer[s..i]) {
                spans.push((s as u32, i as u32));
            }
        }
    }
    // Last token has no trailing separator
    if let Some(s) = start {
        if keep(&buffer[s..]) {
            spans.push((s as u32, buffer.len() as u32));
        }
    }

    Tokens { buffer, spans }
}
