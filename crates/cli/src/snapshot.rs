//! JSON corpus snapshots on disk.
//!
//! A snapshot is `{ "documents": [...], "embeddings": [...] }`. Writes go to
//! a temp file next to the target and are renamed into place, so a crash
//! never leaves a half-written snapshot behind.

use ragrank_core::{Document, DocumentId, Embedding, InMemoryStore, OwnerId, RetrievalError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    Invalid(#[from] RetrievalError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Documents and their embeddings, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub embeddings: Vec<Embedding>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = fs::read(path).map_err(io_err(path))?;
        let snapshot: Snapshot =
            serde_json::from_slice(&raw).map_err(|source| SnapshotError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(
            documents = snapshot.documents.len(),
            embeddings = snapshot.embeddings.len(),
            "Loaded snapshot {:?}",
            path
        );
        Ok(snapshot)
    }

    /// Write the snapshot atomically: temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, &bytes).map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, path).map_err(io_err(path))?;

        tracing::info!(
            documents = self.documents.len(),
            bytes = bytes.len(),
            "Saved snapshot {:?}",
            path
        );
        Ok(())
    }

    /// Load the snapshot into an in-memory store.
    ///
    /// Embeddings whose document is missing are skipped with a warning, and
    /// so is every embedding after the first for one document. A repeated
    /// document id or inconsistent dimensions are an error.
    pub fn into_store(self) -> Result<InMemoryStore, SnapshotError> {
        let store = InMemoryStore::new();
        for document in self.documents {
            store.insert_document(document)?;
        }
        let mut embedded: HashSet<DocumentId> = HashSet::with_capacity(self.embeddings.len());
        for embedding in self.embeddings {
            if store.get(&embedding.document_id).is_none() {
                tracing::warn!(
                    document_id = %embedding.document_id,
                    "Embedding references an unknown document, skipped"
                );
                continue;
            }
            if !embedded.insert(embedding.document_id) {
                tracing::warn!(
                    document_id = %embedding.document_id,
                    "Duplicate embedding ignored"
                );
                continue;
            }
            store.insert_embedding(embedding)?;
        }
        Ok(store)
    }
}

/// One entry of an `embed-corpus` input file. The id is generated when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub id: Option<DocumentId>,
    pub owner_id: OwnerId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub location: String,
}

impl From<DocumentInput> for Document {
    fn from(input: DocumentInput) -> Self {
        Document::with_id(
            input.id.unwrap_or_else(Uuid::new_v4),
            input.owner_id,
            input.title,
            input.content,
            input.location,
        )
    }
}

/// Read a JSON array of [`DocumentInput`].
pub fn load_inputs(path: &Path) -> Result<Vec<Document>, SnapshotError> {
    let raw = fs::read(path).map_err(io_err(path))?;
    let inputs: Vec<DocumentInput> =
        serde_json::from_slice(&raw).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(inputs.into_iter().map(Document::from).collect())
}
