//! Corpus snapshots: documents joined with their embeddings by identity.
//!
//! Lexical and similarity scores are fused position by position, so both
//! signals must be computed over one ordering. A [`Corpus`] guarantees that by
//! pairing each document with its own embedding up front, keyed by
//! [`DocumentId`], instead of zipping two independently fetched lists.

use crate::document::{Document, DocumentId, Embedding};
use crate::error::{Result, RetrievalError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// One document with its embedding vector.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub document: Arc<Document>,
    pub embedding: Vec<f32>,
}

/// A read-only snapshot of the documents visible to one retrieval call.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    dimension: usize,
    generation: Option<u64>,
    orphan_embeddings: usize,
}

impl Corpus {
    /// An empty corpus.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Join documents with their embeddings by document id.
    ///
    /// Document order is preserved. Documents without an embedding are left
    /// out, as are embeddings whose document is not in `documents`. If a
    /// document has several embeddings the first one wins. All vectors must
    /// share one dimension, otherwise this fails with
    /// [`RetrievalError::DimensionMismatch`].
    pub fn join(documents: Vec<Arc<Document>>, embeddings: Vec<Embedding>) -> Result<Self> {
        if documents.is_empty() || embeddings.is_empty() {
            return Ok(Self::empty());
        }

        let mut by_id: HashMap<DocumentId, Vec<f32>> = HashMap::with_capacity(embeddings.len());
        for embedding in embeddings {
            if by_id.contains_key(&embedding.document_id) {
                warn!(document_id = %embedding.document_id, "Duplicate embedding ignored");
                continue;
            }
            by_id.insert(embedding.document_id, embedding.vector);
        }

        let mut entries = Vec::with_capacity(documents.len());
        let mut dimension: Option<usize> = None;
        for document in documents {
            let Some(vector) = by_id.remove(&document.id) else {
                warn!(document_id = %document.id, "Document has no embedding, skipped");
                continue;
            };
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(RetrievalError::DimensionMismatch {
                        document_id: Some(document.id),
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }
            entries.push(CorpusEntry {
                document,
                embedding: vector,
            });
        }

        if !by_id.is_empty() {
            warn!(orphans = by_id.len(), "Embeddings without a document ignored");
        }

        Ok(Self {
            entries,
            dimension: dimension.unwrap_or(0),
            generation: None,
            orphan_embeddings: by_id.len(),
        })
    }

    /// Tag the snapshot with the store generation it was taken at.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Document ids in corpus order.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> + '_ {
        self.entries.iter().map(|e| &e.document.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared embedding dimension, 0 for an empty corpus.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Store generation this snapshot was taken at, if it came from a store.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Embeddings dropped by the join because their document was not listed.
    pub fn orphan_embeddings(&self) -> usize {
        self.orphan_embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn doc(text: &str) -> Arc<Document> {
        Arc::new(Document::new(Uuid::nil(), "t", text, "mem"))
    }

    #[test]
    fn test_join_by_identity_not_position() {
        let a = doc("alpha");
        let b = doc("beta");
        // Embeddings listed in the opposite order of the documents.
        let embeddings = vec![
            Embedding::new(b.id, vec![0.0, 1.0]),
            Embedding::new(a.id, vec![1.0, 0.0]),
        ];
        let corpus = Corpus::join(vec![a.clone(), b.clone()], embeddings).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.entries()[0].document.id, a.id);
        assert_eq!(corpus.entries()[0].embedding, vec![1.0, 0.0]);
        assert_eq!(corpus.entries()[1].document.id, b.id);
        assert_eq!(corpus.entries()[1].embedding, vec![0.0, 1.0]);
        assert_eq!(corpus.dimension(), 2);
    }

    #[test]
    fn test_join_empty_sides() {
        let a = doc("alpha");
        assert!(Corpus::join(vec![a.clone()], vec![]).unwrap().is_empty());
        assert!(Corpus::join(vec![], vec![Embedding::new(a.id, vec![1.0])])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_join_skips_unmatched() {
        let a = doc("alpha");
        let b = doc("beta");
        let embeddings = vec![
            Embedding::new(a.id, vec![1.0]),
            Embedding::new(Uuid::new_v4(), vec![2.0]),
        ];
        let corpus = Corpus::join(vec![a.clone(), b], embeddings).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.ids().next(), Some(&a.id));
        assert_eq!(corpus.orphan_embeddings(), 1);
    }

    #[test]
    fn test_join_keeps_first_duplicate() {
        let a = doc("alpha");
        let embeddings = vec![
            Embedding::new(a.id, vec![1.0, 1.0]),
            Embedding::new(a.id, vec![9.0, 9.0]),
        ];
        let corpus = Corpus::join(vec![a], embeddings).unwrap();
        assert_eq!(corpus.entries()[0].embedding, vec![1.0, 1.0]);
    }

    #[test]
    fn test_join_dimension_mismatch() {
        let a = doc("alpha");
        let b = doc("beta");
        let embeddings = vec![
            Embedding::new(a.id, vec![1.0, 0.0]),
            Embedding::new(b.id, vec![1.0, 0.0, 0.0]),
        ];
        let err = Corpus::join(vec![a, b.clone()], embeddings).unwrap_err();
        match err {
            RetrievalError::DimensionMismatch {
                document_id,
                expected,
                actual,
            } => {
                assert_eq!(document_id, Some(b.id));
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_generation_tag() {
        let a = doc("alpha");
        let corpus = Corpus::join(vec![a.clone()], vec![Embedding::new(a.id, vec![1.0])]).unwrap();
        assert_eq!(corpus.generation(), None);
        assert_eq!(corpus.with_generation(3).generation(), Some(3));
    }
}
