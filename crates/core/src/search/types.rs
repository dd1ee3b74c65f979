//! Scored document types for retrieval results.

use crate::document::Document;
use std::sync::Arc;

/// A document with the scores that placed it in a ranking.
///
/// `lexical_score` and `similarity_score` are the max-normalized signals that
/// went into the fusion; `score` is the fused value the ranking is sorted by.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// The matched document (shared reference).
    pub document: Arc<Document>,
    /// Normalized BM25 score.
    pub lexical_score: f32,
    /// Normalized embedding similarity.
    pub similarity_score: f32,
    /// `alpha * lexical_score + (1 - alpha) * similarity_score`.
    pub score: f32,
}
