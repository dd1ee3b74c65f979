//! Error types for retrieval operations.
//!
//! An empty corpus is not an error: retrieval returns an empty ranking.
//! Everything else that can go wrong during a call surfaces here.

use crate::document::DocumentId;
use crate::embedding::EmbeddingError;
use thiserror::Error;

/// Errors returned by the retrieval engine and its collaborators.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding vectors of inconsistent length. `document_id` is `None`
    /// when the offending vector is the query embedding.
    #[error(
        "embedding dimension mismatch for {}: expected {expected}, got {actual}",
        subject(.document_id)
    )]
    DimensionMismatch {
        document_id: Option<DocumentId>,
        expected: usize,
        actual: usize,
    },

    /// The embedding collaborator kept failing until the retry budget ran out.
    #[error("embedding generation failed after {attempts} attempts: {last_error}")]
    EmbeddingGenerationExhausted {
        attempts: u32,
        #[source]
        last_error: EmbeddingError,
    },

    /// The ranking produced documents, but none of them are in the caller's allow-list.
    #[error("none of the {ranked} ranked documents are in the allow-list")]
    NoResultsAfterFiltering { ranked: usize },

    /// A retrieval parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A pluggable scorer returned a score vector that does not cover the corpus.
    #[error("{scorer} scorer returned {actual} scores for {expected} documents")]
    ScorerOutput {
        scorer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The document store failed to produce a snapshot.
    #[error("document store error: {0}")]
    Store(String),
}

fn subject(document_id: &Option<DocumentId>) -> String {
    match document_id {
        Some(id) => format!("document {id}"),
        None => "query embedding".to_string(),
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_dimension_mismatch_names_subject() {
        let err = RetrievalError::DimensionMismatch {
            document_id: None,
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch for query embedding: expected 4, got 3"
        );

        let id = Uuid::new_v4();
        let err = RetrievalError::DimensionMismatch {
            document_id: Some(id),
            expected: 4,
            actual: 5,
        };
        assert!(err.to_string().contains(&format!("document {id}")));
    }

    #[test]
    fn test_scorer_output_message() {
        let err = RetrievalError::ScorerOutput {
            scorer: "bm25",
            expected: 3,
            actual: 1,
        };
        assert_eq!(err.to_string(), "bm25 scorer returned 1 scores for 3 documents");
    }

    #[test]
    fn test_exhausted_keeps_source() {
        let err = RetrievalError::EmbeddingGenerationExhausted {
            attempts: 3,
            last_error: EmbeddingError::Request("connection refused".into()),
        };
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
