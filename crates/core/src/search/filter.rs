//! Post-ranking selection filter.
//!
//! The engine ranks whatever corpus it is given and performs no
//! authorization. Callers that want to restrict results to the documents a
//! user selected intersect the ranking with an [`AllowList`].

use crate::document::DocumentId;
use crate::error::{Result, RetrievalError};
use crate::search::types::ScoredDocument;
use std::collections::HashSet;

/// A set of document ids the caller is willing to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: HashSet<DocumentId>,
}

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = DocumentId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep the ranked documents that are in the allow-list, preserving order.
    ///
    /// An empty ranking stays an empty `Ok`. A non-empty ranking with no
    /// allowed document fails with [`RetrievalError::NoResultsAfterFiltering`],
    /// so callers can tell "nothing matched" from "nothing selected".
    pub fn apply(&self, ranked: Vec<ScoredDocument>) -> Result<Vec<ScoredDocument>> {
        if ranked.is_empty() {
            return Ok(ranked);
        }
        let total = ranked.len();
        let kept: Vec<ScoredDocument> = ranked
            .into_iter()
            .filter(|r| self.contains(&r.document.id))
            .collect();
        if kept.is_empty() {
            return Err(RetrievalError::NoResultsAfterFiltering { ranked: total });
        }
        Ok(kept)
    }
}

impl FromIterator<DocumentId> for AllowList {
    fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
        Self::new(iter)
    }
}
