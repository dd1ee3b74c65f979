//! Ranking primitives: fused results, allow-list filtering, and hybrid fusion.

/// Caller-side allow-list applied after ranking.
pub mod filter;
/// Max-normalization, linear fusion, and top-k selection.
pub mod hybrid;
/// Result types.
pub mod types;

pub use filter::AllowList;
pub use hybrid::{linear_fusion, max_normalize, select_top_k};
pub use types::ScoredDocument;
