//! # ragrank-cli
//!
//! Command-line surface for `ragrank-core`: JSON corpus snapshots and an
//! OpenAI-compatible HTTP embedder.

/// OpenAI-compatible HTTP embedding backend.
pub mod http_embedder;
/// Snapshot load/save and `embed-corpus` input parsing.
pub mod snapshot;

pub use http_embedder::{HttpEmbedder, HttpEmbedderConfig};
pub use snapshot::{load_inputs, DocumentInput, Snapshot, SnapshotError};
