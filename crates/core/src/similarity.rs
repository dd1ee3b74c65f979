//! Embedding similarity between the query and every corpus document.
//!
//! Cosine similarity is `dot(d, q) / (‖d‖·‖q‖ + 1e-8)`. The epsilon keeps
//! zero-norm vectors at similarity 0 instead of producing NaN, which matters
//! for the max-normalization step downstream. All metrics return a value
//! where **higher is better**.

use crate::config::COSINE_EPSILON;
use crate::corpus::Corpus;
use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};

/// A similarity scoring strategy.
///
/// Implementations return one similarity per corpus entry, in corpus order,
/// and fail with [`RetrievalError::DimensionMismatch`] if the query does not
/// have the corpus dimension.
pub trait SimilarityScorer: Send + Sync {
    /// Score every document of `corpus` against `query_embedding`.
    fn score(&self, corpus: &Corpus, query_embedding: &[f32]) -> Result<Vec<f32>>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Similarity metric between two embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity with an epsilon-guarded denominator. Range: \[-1, 1\].
    #[default]
    Cosine,
    /// Raw dot product. Unbounded; only meaningful for unit-length embeddings.
    DotProduct,
}

impl SimilarityMetric {
    /// Similarity between two equal-length vectors.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::DotProduct => dot_product(a, b),
        }
    }
}

impl SimilarityScorer for SimilarityMetric {
    fn score(&self, corpus: &Corpus, query_embedding: &[f32]) -> Result<Vec<f32>> {
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        if query_embedding.len() != corpus.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                document_id: None,
                expected: corpus.dimension(),
                actual: query_embedding.len(),
            });
        }

        let query_norm = l2_norm(query_embedding);
        let mut scores = Vec::with_capacity(corpus.len());
        for entry in corpus.entries() {
            if entry.embedding.len() != query_embedding.len() {
                return Err(RetrievalError::DimensionMismatch {
                    document_id: Some(entry.document.id),
                    expected: query_embedding.len(),
                    actual: entry.embedding.len(),
                });
            }
            let score = match self {
                SimilarityMetric::Cosine => {
                    cosine_with_query_norm(&entry.embedding, query_embedding, query_norm)
                }
                SimilarityMetric::DotProduct => dot_product(&entry.embedding, query_embedding),
            };
            scores.push(score);
        }
        Ok(scores)
    }

    fn name(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::DotProduct => "dot_product",
        }
    }
}

/// Dot product of two f32 slices. Extra components of the longer slice are ignored.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean length of a vector.
#[inline]
pub fn l2_norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with [`COSINE_EPSILON`] added to the denominator.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_query_norm(a, b, l2_norm(b))
}

/// Cosine similarity with the second vector's norm precomputed.
#[inline]
fn cosine_with_query_norm(doc: &[f32], query: &[f32], query_norm: f32) -> f32 {
    dot_product(doc, query) / (l2_norm(doc) * query_norm + COSINE_EPSILON)
}
