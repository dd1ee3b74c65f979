//! # ragrank-core
//!
//! Hybrid document retrieval: ranks a corpus against a natural-language query
//! by blending BM25 lexical relevance with embedding cosine similarity.
//!
//! This is the core library crate with zero async dependencies. The document
//! store and the embedding backend are collaborators behind the
//! [`DocumentStore`] and [`Embedder`] traits.
//!
//! ```
//! use ragrank_core::{Corpus, Document, Embedding, HybridRetriever, RetrievalParams};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! let owner = Uuid::new_v4();
//! let cats = Arc::new(Document::new(owner, "cats", "cats are great pets", "mem"));
//! let dogs = Arc::new(Document::new(owner, "dogs", "dogs are loyal companions", "mem"));
//! let corpus = Corpus::join(
//!     vec![cats.clone(), dogs.clone()],
//!     vec![
//!         Embedding::new(cats.id, vec![1.0, 0.0]),
//!         Embedding::new(dogs.id, vec![0.0, 1.0]),
//!     ],
//! )?;
//!
//! let hits = HybridRetriever::default().retrieve(
//!     &corpus,
//!     "cats pets",
//!     &[0.9, 0.1],
//!     &RetrievalParams::default(),
//! )?;
//! assert_eq!(hits[0].document.id, cats.id);
//! # Ok::<(), ragrank_core::RetrievalError>(())
//! ```

/// BM25 lexical scoring: tokenizers, inverted index, and scorers.
pub mod bm25;
/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Identity-keyed join of documents and embeddings.
pub mod corpus;
/// Core document types: `Document` and `Embedding`.
pub mod document;
/// Embedding backend trait, process-wide embedder, and retry policy.
pub mod embedding;
/// Error types.
pub mod error;
/// The hybrid retriever and its parameters.
pub mod retriever;
/// Normalization, fusion, top-k selection, and allow-list filtering.
pub mod search;
/// Cosine and dot-product similarity.
pub mod similarity;
/// Document store trait and in-memory implementation.
pub mod store;

pub use bm25::{Bm25Params, Bm25Scorer, CachedBm25Scorer, LexicalScorer, Tokenizer};
pub use corpus::{Corpus, CorpusEntry};
pub use document::{Document, DocumentId, Embedding, OwnerId};
pub use embedding::{Backoff, Embedder, EmbeddingError, RetryOutcome, RetryPolicy};
pub use error::{Result, RetrievalError};
pub use retriever::{HybridRetriever, RetrievalParams};
pub use search::{AllowList, ScoredDocument};
pub use similarity::{SimilarityMetric, SimilarityScorer};
pub use store::{DocumentStore, InMemoryStore};
