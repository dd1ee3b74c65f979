//! Embedding collaborator interface.
//!
//! The engine treats embedding generation as a black box: text in, fixed
//! length vector out. Backends implement [`Embedder`]; calls go through a
//! [`RetryPolicy`] so transient failures are retried a bounded number of times.
//!
//! Model-backed embedders are expensive to construct. A process installs one
//! with [`install_global`] at startup and every request reuses it via
//! [`global`]; it lives until the process exits.

mod retry;

pub use retry::{Backoff, RetryOutcome, RetryPolicy};

use crate::error::{Result, RetrievalError};
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Errors that can occur while generating an embedding.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// The backend could not be reached or the request failed.
    #[error("embedding request failed: {0}")]
    Request(String),

    /// Rate limited by the backend.
    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds, if provided by the backend
        retry_after_ms: Option<u64>,
    },

    /// The backend answered with something that is not an embedding.
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    /// The backend returned a vector of the wrong length.
    #[error("expected a {expected}-dimensional embedding, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Backend configuration error.
    #[error("embedding configuration error: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Wait suggested by the backend before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EmbeddingError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// A backend that turns text into an embedding vector.
///
/// Implementations must be shareable across request-handling threads.
pub trait Embedder: Send + Sync + Debug {
    /// Generate the embedding for a single text.
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of texts.
    ///
    /// The default implementation calls `embed` for each text.
    fn embed_batch(&self, texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Dimension of the vectors this backend produces.
    fn dimensions(&self) -> usize;

    /// Backend name for logs (e.g. "http").
    fn name(&self) -> &str;
}

/// Embed `text` under `policy`, mapping exhaustion to
/// [`RetrievalError::EmbeddingGenerationExhausted`]. A rate-limited attempt
/// waits at least as long as the backend asked.
pub fn embed_with_retry<E: Embedder + ?Sized>(
    embedder: &E,
    text: &str,
    policy: &RetryPolicy,
) -> Result<Vec<f32>> {
    let outcome = policy.run_with_hint(
        |attempt| {
            debug!(backend = embedder.name(), attempt, "Generating embedding");
            embedder.embed(text)
        },
        EmbeddingError::retry_after,
    );
    outcome.into_result(|attempts, last_error| RetrievalError::EmbeddingGenerationExhausted {
        attempts,
        last_error,
    })
}

static GLOBAL_EMBEDDER: OnceLock<Arc<dyn Embedder>> = OnceLock::new();

/// Install the process-wide embedder.
///
/// Only the first call succeeds; later calls hand the rejected embedder back.
pub fn install_global(
    embedder: Arc<dyn Embedder>,
) -> std::result::Result<(), Arc<dyn Embedder>> {
    GLOBAL_EMBEDDER.set(embedder)
}

/// The process-wide embedder, if one has been installed.
pub fn global() -> Option<Arc<dyn Embedder>> {
    GLOBAL_EMBEDDER.get().cloned()
}

/// The process-wide embedder, constructing it with `init` on first use.
pub fn global_or_init(init: impl FnOnce() -> Arc<dyn Embedder>) -> Arc<dyn Embedder> {
    Arc::clone(GLOBAL_EMBEDDER.get_or_init(init))
}
