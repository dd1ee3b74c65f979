//! Core document types for ragrank.
//!
//! A [`Document`] is an owned, immutable record with text content and a
//! storage location. Each document has exactly one [`Embedding`], created at
//! ingestion time and stored separately, keyed by the document's id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a document.
pub type DocumentId = Uuid;

/// Identifier of the user that owns a document.
pub type OwnerId = Uuid;

/// A stored document with text content, unique ID, and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (UUID v4).
    pub id: DocumentId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Human-readable title, usually the uploaded file name.
    pub title: String,
    /// Full text content, indexed by BM25.
    pub content: String,
    /// Where the original file lives (path or URI).
    pub location: String,
}

impl Document {
    /// Creates a new document with a random UUID.
    pub fn new(
        owner_id: OwnerId,
        title: impl Into<String>,
        content: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), owner_id, title, content, location)
    }

    /// Creates a document with a specific UUID.
    pub fn with_id(
        id: DocumentId,
        owner_id: OwnerId,
        title: impl Into<String>,
        content: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            owner_id,
            title: title.into(),
            content: content.into(),
            location: location.into(),
        }
    }
}

/// The embedding vector of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The document this vector belongs to.
    pub document_id: DocumentId,
    /// Fixed-dimension embedding vector.
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(document_id: DocumentId, vector: Vec<f32>) -> Self {
        Self {
            document_id,
            vector,
        }
    }

    /// Number of components in the vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
