//! Global configuration constants for ragrank.
//!
//! Scoring defaults, input validation limits, and embedding retry defaults are
//! defined here. These are compile-time constants; runtime configuration is
//! carried by [`crate::retriever::RetrievalParams`], [`crate::bm25::Bm25Params`]
//! and [`crate::embedding::RetryPolicy`], which default to these values.

/// BM25 term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Higher values allow TF to grow more.
/// Typical range: 1.2–2.0.
pub const BM25_K1: f32 = 1.5;

/// BM25 document length normalization parameter.
///
/// 0.0 = no length normalization, 1.0 = full normalization.
pub const BM25_B: f32 = 0.75;

/// Added to the cosine denominator so zero-norm vectors score 0 instead of NaN.
pub const COSINE_EPSILON: f32 = 1e-8;

/// Default lexical weight in the fused score (`1 - alpha` goes to similarity).
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Default number of documents returned per retrieval call.
pub const DEFAULT_TOP_K: usize = 10;

/// Maximum `top_k` accepted per retrieval call.
pub const MAX_TOP_K: usize = 10_000;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Default number of attempts made against the embedding collaborator.
pub const DEFAULT_EMBED_MAX_ATTEMPTS: u32 = 3;

/// Default delay between embedding attempts, in milliseconds.
pub const DEFAULT_EMBED_RETRY_DELAY_MS: u64 = 2_000;

/// Upper bound on a single backoff sleep when exponential backoff is used.
pub const MAX_EMBED_RETRY_DELAY_MS: u64 = 30_000;
