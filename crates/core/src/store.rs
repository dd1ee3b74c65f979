//! Document store collaborator.
//!
//! The engine never owns documents. It asks a [`DocumentStore`] for the
//! documents and embeddings visible to one call and joins them into a
//! [`Corpus`]. [`InMemoryStore`] is the reference implementation, with
//! thread-safe concurrent access through a `parking_lot::RwLock`.

use crate::config::MAX_DIMENSION;
use crate::corpus::Corpus;
use crate::document::{Document, DocumentId, Embedding, OwnerId};
use crate::error::{Result, RetrievalError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Source of documents and embeddings for retrieval.
pub trait DocumentStore: Send + Sync {
    /// Documents visible to `owner`, or all documents when `owner` is `None`.
    fn list_documents(&self, owner: Option<OwnerId>) -> Result<Vec<Arc<Document>>>;

    /// Every stored embedding.
    fn list_embeddings(&self) -> Result<Vec<Embedding>>;

    /// Counter bumped by every mutation.
    fn generation(&self) -> u64;

    /// Documents joined with their embeddings, tagged with the generation.
    ///
    /// Only the embeddings of the listed documents reach the join, so other
    /// owners' vectors never show up as orphans.
    fn snapshot(&self, owner: Option<OwnerId>) -> Result<Corpus> {
        let generation = self.generation();
        let documents = self.list_documents(owner)?;
        let visible: HashSet<DocumentId> = documents.iter().map(|d| d.id).collect();
        let embeddings = self
            .list_embeddings()?
            .into_iter()
            .filter(|e| visible.contains(&e.document_id))
            .collect();
        Ok(Corpus::join(documents, embeddings)?.with_generation(generation))
    }
}

#[derive(Debug, Default)]
struct StoreData {
    documents: HashMap<DocumentId, Arc<Document>>,
    /// Insertion order, so snapshots are stable across calls.
    order: Vec<DocumentId>,
    embeddings: HashMap<DocumentId, Vec<f32>>,
    dimension: Option<usize>,
    generation: u64,
}

impl StoreData {
    fn documents_for(&self, owner: Option<OwnerId>) -> Vec<Arc<Document>> {
        self.order
            .iter()
            .filter_map(|id| self.documents.get(id))
            .filter(|d| owner.map_or(true, |o| d.owner_id == o))
            .cloned()
            .collect()
    }

    fn embeddings(&self) -> Vec<Embedding> {
        self.embeddings_for(&self.order)
    }

    fn embeddings_for<'a>(&self, ids: impl IntoIterator<Item = &'a DocumentId>) -> Vec<Embedding> {
        ids.into_iter()
            .filter_map(|id| {
                self.embeddings
                    .get(id)
                    .map(|v| Embedding::new(*id, v.clone()))
            })
            .collect()
    }

    fn ensure_absent(&self, id: DocumentId) -> Result<()> {
        if self.documents.contains_key(&id) {
            return Err(RetrievalError::Store(format!("document {id} already exists")));
        }
        Ok(())
    }
}

/// Thread-safe in-memory document store.
///
/// Cloning is cheap and shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<RwLock<StoreData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document together with its embedding.
    ///
    /// Documents are immutable: an id that is already stored is rejected.
    /// The first embedding fixes the store dimension; later vectors of a
    /// different length are rejected and nothing is stored.
    pub fn insert(&self, document: Document, vector: Vec<f32>) -> Result<DocumentId> {
        let mut data = self.data.write();
        data.ensure_absent(document.id)?;
        check_dimension(&data, document.id, &vector)?;
        let id = document.id;
        data.documents.insert(id, Arc::new(document));
        data.order.push(id);
        if data.dimension.is_none() {
            data.dimension = Some(vector.len());
        }
        data.embeddings.insert(id, vector);
        data.generation += 1;
        debug!(document_id = %id, generation = data.generation, "Inserted document");
        Ok(id)
    }

    /// Insert a document without an embedding. It stays out of snapshots
    /// until [`insert_embedding`](Self::insert_embedding) is called for it.
    pub fn insert_document(&self, document: Document) -> Result<DocumentId> {
        let mut data = self.data.write();
        data.ensure_absent(document.id)?;
        let id = document.id;
        data.documents.insert(id, Arc::new(document));
        data.order.push(id);
        data.generation += 1;
        Ok(id)
    }

    /// Attach or replace the embedding of a stored document.
    pub fn insert_embedding(&self, embedding: Embedding) -> Result<()> {
        let mut data = self.data.write();
        if !data.documents.contains_key(&embedding.document_id) {
            return Err(RetrievalError::Store(format!(
                "document {} not found",
                embedding.document_id
            )));
        }
        check_dimension(&data, embedding.document_id, &embedding.vector)?;
        if data.dimension.is_none() {
            data.dimension = Some(embedding.vector.len());
        }
        data.embeddings
            .insert(embedding.document_id, embedding.vector);
        data.generation += 1;
        Ok(())
    }

    /// Remove a document and its embedding. Returns whether it existed.
    pub fn delete(&self, id: &DocumentId) -> bool {
        let mut data = self.data.write();
        let existed = data.documents.remove(id).is_some();
        if existed {
            data.embeddings.remove(id);
            data.order.retain(|d| d != id);
            data.generation += 1;
            debug!(document_id = %id, generation = data.generation, "Deleted document");
        }
        existed
    }

    pub fn get(&self, id: &DocumentId) -> Option<Arc<Document>> {
        self.data.read().documents.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().documents.is_empty()
    }

    /// Embedding dimension, fixed by the first stored vector.
    pub fn dimension(&self) -> Option<usize> {
        self.data.read().dimension
    }
}

fn check_dimension(data: &StoreData, id: DocumentId, vector: &[f32]) -> Result<()> {
    if vector.is_empty() || vector.len() > MAX_DIMENSION {
        return Err(RetrievalError::InvalidParameter(format!(
            "embedding dimension must be between 1 and {MAX_DIMENSION}, got {}",
            vector.len()
        )));
    }
    match data.dimension {
        Some(expected) if expected != vector.len() => Err(RetrievalError::DimensionMismatch {
            document_id: Some(id),
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

impl DocumentStore for InMemoryStore {
    fn list_documents(&self, owner: Option<OwnerId>) -> Result<Vec<Arc<Document>>> {
        Ok(self.data.read().documents_for(owner))
    }

    fn list_embeddings(&self) -> Result<Vec<Embedding>> {
        Ok(self.data.read().embeddings())
    }

    fn generation(&self) -> u64 {
        self.data.read().generation
    }

    // One read lock for the whole snapshot, so the generation matches the data.
    fn snapshot(&self, owner: Option<OwnerId>) -> Result<Corpus> {
        let data = self.data.read();
        let documents = data.documents_for(owner);
        let embeddings = data.embeddings_for(documents.iter().map(|d| &d.id));
        let corpus = Corpus::join(documents, embeddings)?;
        Ok(corpus.with_generation(data.generation))
    }
}
