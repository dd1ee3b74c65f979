//! BM25 scoring engine.
//!
//! Scores every document of a corpus against a query with the BM25 formula,
//! using the non-negative IDF variant `ln((N - df + 0.5) / (df + 0.5) + 1)` so a
//! term shared by most of a small corpus still counts as a (weak) match.
//!
//! Two [`LexicalScorer`] strategies are provided: [`Bm25Scorer`] rebuilds the
//! index on every call, [`CachedBm25Scorer`] reuses it while the store
//! generation and document set are unchanged.

use crate::bm25::inverted_index::InvertedIndex;
use crate::bm25::tokenizer::Tokenizer;
use crate::config;
use crate::corpus::Corpus;
use crate::document::DocumentId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Length normalization.
    pub b: f32,
    /// Tokenization applied to both documents and query.
    pub tokenizer: Tokenizer,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: config::BM25_K1,
            b: config::BM25_B,
            tokenizer: Tokenizer::default(),
        }
    }
}

/// Score every indexed document against `query`.
///
/// Returns one score per corpus position. Documents sharing no term with the
/// query score exactly 0; an empty query or empty index yields all zeros.
pub fn bm25_scores(index: &InvertedIndex, query: &str, params: &Bm25Params) -> Vec<f32> {
    let mut scores = vec![0.0f32; index.doc_lengths.len()];

    let query_tokens = params.tokenizer.tokenize(query);
    if query_tokens.is_empty() || index.doc_count == 0 {
        return scores;
    }

    let avgdl = index.average_doc_length();
    let n = index.doc_count as f32;
    let k1 = params.k1;
    let b = params.b;

    for token in query_tokens.iter() {
        if let Some(postings) = index.index.get(token) {
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                // A posting implies a non-empty document, so avgdl > 0 here.
                let dl = index
                    .doc_lengths
                    .get(posting.doc_id as usize)
                    .copied()
                    .unwrap_or(0) as f32;
                let tf = posting.term_frequency as f32;

                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
                scores[posting.doc_id as usize] += idf * tf_norm;
            }
        }
    }

    scores
}

/// A lexical scoring strategy.
///
/// Implementations return one score per corpus entry, in corpus order.
pub trait LexicalScorer: Send + Sync {
    /// Score every document of `corpus` against `query`.
    fn score(&self, corpus: &Corpus, query: &str) -> Vec<f32>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}

/// BM25 over an index built fresh from the corpus on every call.
#[derive(Debug, Clone, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }
}

fn build_index(corpus: &Corpus, tokenizer: Tokenizer) -> InvertedIndex {
    InvertedIndex::build(
        corpus.entries().iter().map(|e| e.document.content.as_str()),
        tokenizer,
    )
}

impl LexicalScorer for Bm25Scorer {
    fn score(&self, corpus: &Corpus, query: &str) -> Vec<f32> {
        let index = build_index(corpus, self.params.tokenizer);
        bm25_scores(&index, query, &self.params)
    }

    fn name(&self) -> &'static str {
        "bm25"
    }
}

struct CachedIndex {
    generation: u64,
    ids: Vec<DocumentId>,
    index: Arc<InvertedIndex>,
}

/// BM25 that keeps the last built index and reuses it for corpora taken at the
/// same store generation with the same documents in the same order.
///
/// Any insert or delete in the store bumps its generation, which forces a
/// rebuild on the next call. Corpora without a generation (built by hand) are
/// never cached.
pub struct CachedBm25Scorer {
    params: Bm25Params,
    cache: RwLock<Option<CachedIndex>>,
}

impl CachedBm25Scorer {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached index.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// Store generation of the cached index, if any.
    pub fn cached_generation(&self) -> Option<u64> {
        self.cache.read().as_ref().map(|c| c.generation)
    }

    fn index_for(&self, corpus: &Corpus) -> Arc<InvertedIndex> {
        let Some(generation) = corpus.generation() else {
            return Arc::new(build_index(corpus, self.params.tokenizer));
        };

        {
            let cache = self.cache.read();
            if let Some(cached) = cache.as_ref() {
                if cached.generation == generation && cached.ids.iter().eq(corpus.ids()) {
                    return Arc::clone(&cached.index);
                }
            }
        }

        let index = Arc::new(build_index(corpus, self.params.tokenizer));
        *self.cache.write() = Some(CachedIndex {
            generation,
            ids: corpus.ids().copied().collect(),
            index: Arc::clone(&index),
        });
        debug!(generation, documents = corpus.len(), "Rebuilt cached BM25 index");
        index
    }
}

impl Default for CachedBm25Scorer {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

impl std::fmt::Debug for CachedBm25Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBm25Scorer")
            .field("params", &self.params)
            .field("cached_generation", &self.cached_generation())
            .finish()
    }
}

impl LexicalScorer for CachedBm25Scorer {
    fn score(&self, corpus: &Corpus, query: &str) -> Vec<f32> {
        let index = self.index_for(corpus);
        bm25_scores(&index, query, &self.params)
    }

    fn name(&self) -> &'static str {
        "bm25-cached"
    }
}
