//! Hybrid retrieval: BM25 and embedding similarity, fused and ranked.
//!
//! [`HybridRetriever::retrieve`] is a pure function of the corpus snapshot,
//! the query, and [`RetrievalParams`]. It holds no per-call state, so one
//! retriever can serve many threads at once.

use crate::bm25::{Bm25Scorer, LexicalScorer};
use crate::config::{DEFAULT_ALPHA, DEFAULT_TOP_K, MAX_TOP_K};
use crate::corpus::Corpus;
use crate::document::{Document, DocumentId, OwnerId};
use crate::embedding::{embed_with_retry, Embedder, RetryPolicy};
use crate::error::{Result, RetrievalError};
use crate::search::{linear_fusion, max_normalize, select_top_k, AllowList, ScoredDocument};
use crate::similarity::{SimilarityMetric, SimilarityScorer};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalParams {
    /// Lexical weight in `[0, 1]`; similarity gets `1 - alpha`.
    pub alpha: f32,
    /// Maximum number of documents returned.
    pub top_k: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RetrievalParams {
    pub fn new(alpha: f32, top_k: usize) -> Self {
        Self { alpha, top_k }
    }

    /// Reject an alpha outside `[0, 1]` (or NaN) and a `top_k` above [`MAX_TOP_K`].
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(RetrievalError::InvalidParameter(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        if self.top_k > MAX_TOP_K {
            return Err(RetrievalError::InvalidParameter(format!(
                "top_k must be at most {MAX_TOP_K}, got {}",
                self.top_k
            )));
        }
        Ok(())
    }
}

/// Ranks a corpus by a weighted blend of lexical and embedding relevance.
pub struct HybridRetriever {
    lexical: Box<dyn LexicalScorer>,
    similarity: Box<dyn SimilarityScorer>,
    retry: RetryPolicy,
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self::new(Box::new(Bm25Scorer::default()), Box::new(SimilarityMetric::Cosine))
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("lexical", &self.lexical.name())
            .field("similarity", &self.similarity.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl HybridRetriever {
    pub fn new(lexical: Box<dyn LexicalScorer>, similarity: Box<dyn SimilarityScorer>) -> Self {
        Self {
            lexical,
            similarity,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_lexical(mut self, lexical: Box<dyn LexicalScorer>) -> Self {
        self.lexical = lexical;
        self
    }

    pub fn with_similarity(mut self, similarity: Box<dyn SimilarityScorer>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Retry policy used by [`search`](Self::search) for the query embedding.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Rank `corpus` against the query and return the best `top_k` documents
    /// with their scores, best first.
    ///
    /// An empty corpus yields an empty ranking. Equal fused scores are ordered
    /// by ascending document id.
    pub fn retrieve(
        &self,
        corpus: &Corpus,
        query_text: &str,
        query_embedding: &[f32],
        params: &RetrievalParams,
    ) -> Result<Vec<ScoredDocument>> {
        params.validate()?;
        if corpus.is_empty() {
            debug!("Empty corpus, nothing to rank");
            return Ok(Vec::new());
        }

        let mut lexical = self.lexical.score(corpus, query_text);
        check_coverage(self.lexical.name(), &lexical, corpus)?;
        let mut similarity = self.similarity.score(corpus, query_embedding)?;
        check_coverage(self.similarity.name(), &similarity, corpus)?;

        max_normalize(&mut lexical);
        max_normalize(&mut similarity);
        let fused = linear_fusion(&lexical, &similarity, params.alpha);

        let ids: Vec<DocumentId> = corpus.ids().copied().collect();
        let entries = corpus.entries();
        let results: Vec<ScoredDocument> = select_top_k(&fused, &ids, params.top_k)
            .into_iter()
            .map(|i| ScoredDocument {
                document: Arc::clone(&entries[i].document),
                lexical_score: lexical[i],
                similarity_score: similarity[i],
                score: fused[i],
            })
            .collect();

        debug!(
            documents = corpus.len(),
            top_k = params.top_k,
            alpha = params.alpha,
            lexical = self.lexical.name(),
            similarity = self.similarity.name(),
            returned = results.len(),
            "Ranked corpus"
        );
        Ok(results)
    }

    /// Like [`retrieve`](Self::retrieve), returning only the documents.
    pub fn retrieve_documents(
        &self,
        corpus: &Corpus,
        query_text: &str,
        query_embedding: &[f32],
        params: &RetrievalParams,
    ) -> Result<Vec<Arc<Document>>> {
        Ok(self
            .retrieve(corpus, query_text, query_embedding, params)?
            .into_iter()
            .map(|r| r.document)
            .collect())
    }

    /// Snapshot `store`, embed the query, rank, and filter by `allow`.
    ///
    /// The query is only embedded when the snapshot has documents. Embedding
    /// failures are retried under this retriever's [`RetryPolicy`]; exhaustion
    /// fails the call. With an allow-list, a non-empty ranking that has no
    /// allowed document fails with [`RetrievalError::NoResultsAfterFiltering`].
    pub fn search(
        &self,
        store: &dyn DocumentStore,
        owner: Option<OwnerId>,
        query_text: &str,
        embedder: &dyn Embedder,
        params: &RetrievalParams,
        allow: Option<&AllowList>,
    ) -> Result<Vec<ScoredDocument>> {
        params.validate()?;
        let corpus = store.snapshot(owner)?;
        if corpus.is_empty() {
            debug!(owner = ?owner, "No documents to search");
            return Ok(Vec::new());
        }

        let query_embedding = embed_with_retry(embedder, query_text, &self.retry)?;
        let ranked = self.retrieve(&corpus, query_text, &query_embedding, params)?;

        let results = match allow {
            Some(allow) => allow.apply(ranked)?,
            None => ranked,
        };
        info!(
            documents = corpus.len(),
            top_k = params.top_k,
            alpha = params.alpha,
            results = results.len(),
            "Hybrid search completed"
        );
        Ok(results)
    }
}

/// Scorers must return exactly one score per corpus entry.
fn check_coverage(scorer: &'static str, scores: &[f32], corpus: &Corpus) -> Result<()> {
    if scores.len() != corpus.len() {
        return Err(RetrievalError::ScorerOutput {
            scorer,
            expected: corpus.len(),
            actual: scores.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bm25::CachedBm25Scorer;
    use crate::document::Embedding;
    use crate::embedding::EmbeddingError;
    use crate::store::InMemoryStore;
    use uuid::Uuid;

    fn corpus(items: &[(&str, Vec<f32>)]) -> Corpus {
        let owner = Uuid::new_v4();
        let docs: Vec<Arc<Document>> = items
            .iter()
            .map(|(text, _)| Arc::new(Document::new(owner, "t", *text, "mem")))
            .collect();
        let embeddings = docs
            .iter()
            .zip(items)
            .map(|(d, (_, v))| Embedding::new(d.id, v.clone()))
            .collect();
        Corpus::join(docs, embeddings).unwrap()
    }

    #[derive(Debug)]
    struct Fixed(Vec<f32>);

    impl Embedder for Fixed {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(self.0.clone())
        }
        fn dimensions(&self) -> usize {
            self.0.len()
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Embedder for Broken {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Request("unreachable".into()))
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    /// Scores only the first document.
    struct Truncated;

    impl LexicalScorer for Truncated {
        fn score(&self, _corpus: &Corpus, _query: &str) -> Vec<f32> {
            vec![1.0]
        }
        fn name(&self) -> &'static str {
            "truncated"
        }
    }

    struct Padded;

    impl SimilarityScorer for Padded {
        fn score(&self, corpus: &Corpus, _query_embedding: &[f32]) -> Result<Vec<f32>> {
            Ok(vec![0.5; corpus.len() + 1])
        }
        fn name(&self) -> &'static str {
            "padded"
        }
    }

    #[test]
    fn test_short_lexical_scores_rejected() {
        let r = HybridRetriever::default().with_lexical(Box::new(Truncated));
        let c = corpus(&[("a", vec![1.0]), ("b", vec![0.5]), ("c", vec![0.2])]);
        let err = r
            .retrieve(&c, "a", &[1.0], &RetrievalParams::new(0.5, 3))
            .unwrap_err();
        match err {
            RetrievalError::ScorerOutput {
                scorer,
                expected,
                actual,
            } => {
                assert_eq!(scorer, "truncated");
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected scorer output error, got {other:?}"),
        }
    }

    #[test]
    fn test_long_similarity_scores_rejected() {
        let r = HybridRetriever::default().with_similarity(Box::new(Padded));
        let c = corpus(&[("a", vec![1.0]), ("b", vec![0.5])]);
        let err = r
            .retrieve(&c, "a", &[1.0], &RetrievalParams::new(0.5, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::ScorerOutput {
                scorer: "padded",
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_params_validation() {
        assert!(RetrievalParams::default().validate().is_ok());
        assert!(RetrievalParams::new(1.5, 10).validate().is_err());
        assert!(RetrievalParams::new(-0.1, 10).validate().is_err());
        assert!(RetrievalParams::new(f32::NAN, 10).validate().is_err());
        assert!(RetrievalParams::new(0.5, MAX_TOP_K + 1).validate().is_err());
    }

    #[test]
    fn test_params_serde_defaults() {
        let p: RetrievalParams = serde_json::from_str(r#"{"top_k": 3}"#).unwrap();
        assert_eq!(p.top_k, 3);
        assert_eq!(p.alpha, DEFAULT_ALPHA);
    }

    #[test]
    fn test_retrieve_empty_corpus() {
        let r = HybridRetriever::default();
        let out = r
            .retrieve(&Corpus::empty(), "anything", &[1.0], &RetrievalParams::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_retrieve_invalid_alpha_rejected() {
        let r = HybridRetriever::default();
        let c = corpus(&[("a", vec![1.0])]);
        let err = r
            .retrieve(&c, "a", &[1.0], &RetrievalParams::new(2.0, 1))
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidParameter(_)));
    }

    #[test]
    fn test_retrieve_scores_are_normalized_and_fused() {
        let r = HybridRetriever::default();
        let c = corpus(&[
            ("cats are great pets", vec![0.0, 1.0]),
            ("dogs are loyal companions", vec![1.0, 0.0]),
        ]);
        let out = r
            .retrieve(&c, "cats", &[1.0, 0.0], &RetrievalParams::new(0.5, 2))
            .unwrap();
        assert_eq!(out.len(), 2);
        for hit in &out {
            assert!(hit.lexical_score <= 1.0 && hit.similarity_score <= 1.0 + 1e-6);
            let expected = 0.5 * hit.lexical_score + 0.5 * hit.similarity_score;
            assert!((hit.score - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_retrieve_top_k_zero() {
        let r = HybridRetriever::default();
        let c = corpus(&[("a", vec![1.0]), ("b", vec![0.5])]);
        let out = r
            .retrieve(&c, "a", &[1.0], &RetrievalParams::new(0.5, 0))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_retrieve_query_dimension_mismatch() {
        let r = HybridRetriever::default();
        let c = corpus(&[("a", vec![1.0, 0.0])]);
        let err = r
            .retrieve(&c, "a", &[1.0], &RetrievalParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                document_id: None,
                ..
            }
        ));
    }

    #[test]
    fn test_retrieve_documents_matches_retrieve() {
        let r = HybridRetriever::default();
        let c = corpus(&[("red apple", vec![1.0, 0.0]), ("green pear", vec![0.0, 1.0])]);
        let params = RetrievalParams::new(0.3, 2);
        let scored = r.retrieve(&c, "apple", &[0.2, 0.8], &params).unwrap();
        let docs = r.retrieve_documents(&c, "apple", &[0.2, 0.8], &params).unwrap();
        let a: Vec<_> = scored.iter().map(|s| s.document.id).collect();
        let b: Vec<_> = docs.iter().map(|d| d.id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cached_lexical_scorer_gives_same_ranking() {
        let store = InMemoryStore::new();
        for (text, v) in [
            ("rust borrow checker", vec![1.0, 0.0]),
            ("python garbage collector", vec![0.0, 1.0]),
            ("rust async runtime", vec![0.7, 0.7]),
        ] {
            store
                .insert(Document::new(Uuid::nil(), "t", text, "mem"), v)
                .unwrap();
        }
        let c = store.snapshot(None).unwrap();
        let params = RetrievalParams::new(0.6, 3);
        let plain = HybridRetriever::default();
        let cached =
            HybridRetriever::default().with_lexical(Box::new(CachedBm25Scorer::default()));
        let a = plain.retrieve_documents(&c, "rust", &[1.0, 0.2], &params).unwrap();
        let b = cached.retrieve_documents(&c, "rust", &[1.0, 0.2], &params).unwrap();
        let c2 = cached.retrieve_documents(&c, "rust", &[1.0, 0.2], &params).unwrap();
        let ids = |v: &[Arc<Document>]| v.iter().map(|d| d.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(ids(&b), ids(&c2));
    }

    #[test]
    fn test_search_end_to_end() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let a = store
            .insert(Document::new(owner, "a", "cats are great pets", "mem"), vec![1.0, 0.0])
            .unwrap();
        store
            .insert(
                Document::new(owner, "b", "dogs are loyal companions", "mem"),
                vec![0.0, 1.0],
            )
            .unwrap();

        let r = HybridRetriever::default().with_retry_policy(RetryPolicy::immediate(1));
        let out = r
            .search(
                &store,
                Some(owner),
                "cats pets",
                &Fixed(vec![1.0, 0.0]),
                &RetrievalParams::default(),
                None,
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].document.id, a);
    }

    #[test]
    fn test_search_empty_store_skips_embedding() {
        let store = InMemoryStore::new();
        let r = HybridRetriever::default().with_retry_policy(RetryPolicy::immediate(1));
        let out = r
            .search(&store, None, "q", &Broken, &RetrievalParams::default(), None)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_search_embedding_exhaustion_fails() {
        let store = InMemoryStore::new();
        store
            .insert(Document::new(Uuid::nil(), "a", "alpha", "mem"), vec![1.0, 0.0])
            .unwrap();
        let r = HybridRetriever::default().with_retry_policy(RetryPolicy::immediate(2));
        let err = r
            .search(&store, None, "alpha", &Broken, &RetrievalParams::default(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::EmbeddingGenerationExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn test_search_allow_list() {
        let store = InMemoryStore::new();
        let a = store
            .insert(Document::new(Uuid::nil(), "a", "alpha", "mem"), vec![1.0, 0.0])
            .unwrap();
        let b = store
            .insert(Document::new(Uuid::nil(), "b", "beta", "mem"), vec![0.0, 1.0])
            .unwrap();
        let r = HybridRetriever::default().with_retry_policy(RetryPolicy::immediate(1));
        let embedder = Fixed(vec![1.0, 0.0]);
        let params = RetrievalParams::default();

        let allow = AllowList::new([b]);
        let out = r
            .search(&store, None, "alpha", &embedder, &params, Some(&allow))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].document.id, b);

        let none = AllowList::new([Uuid::new_v4()]);
        let err = r
            .search(&store, None, "alpha", &embedder, &params, Some(&none))
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NoResultsAfterFiltering { ranked: 2 }));
        assert!(store.get(&a).is_some());
    }
}
