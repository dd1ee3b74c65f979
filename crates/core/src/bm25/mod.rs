//! BM25 lexical scoring: tokenizers, inverted index, and scoring strategies.

/// Term → postings index built over a corpus snapshot.
pub mod inverted_index;
/// BM25 scoring and the [`LexicalScorer`] strategies.
pub mod scorer;
/// Whitespace and alphanumeric tokenizers.
pub mod tokenizer;

pub use inverted_index::{InvertedIndex, Posting};
pub use scorer::{bm25_scores, Bm25Params, Bm25Scorer, CachedBm25Scorer, LexicalScorer};
pub use tokenizer::{tokenize, Tokenizer, Tokens};
