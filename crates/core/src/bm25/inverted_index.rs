//! Inverted index for BM25 scoring.
//!
//! Maps terms to postings lists (corpus position + term frequency). Documents
//! are identified by their u32 position in the corpus snapshot the index was
//! built from, so scores can be written straight into a position-ordered vector.

use crate::bm25::tokenizer::Tokenizer;
use std::collections::HashMap;

/// A single entry in a term's postings list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Position of the document in the corpus.
    pub doc_id: u32,
    /// Number of times the term appears in this document.
    pub term_frequency: u32,
}

/// Inverted index mapping terms to postings lists.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    /// term → list of postings
    pub index: HashMap<String, Vec<Posting>>,
    /// position → document length (number of tokens)
    pub doc_lengths: Vec<u32>,
    /// Total number of documents indexed, including those with no tokens
    pub doc_count: u32,
    /// Sum of all document lengths (for average calculation)
    pub total_doc_length: u64,
}

impl InvertedIndex {
    /// Creates a new empty inverted index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every text in order; the i-th text gets position i.
    pub fn build<'a, I>(texts: I, tokenizer: Tokenizer) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut idx = Self::new();
        for (position, text) in texts.into_iter().enumerate() {
            idx.add_document(position as u32, text, tokenizer);
        }
        idx
    }

    /// Index a document's text at the given corpus position.
    ///
    /// A text that yields no tokens still counts towards `doc_count`; it simply
    /// has no postings and therefore always scores 0.
    pub fn add_document(&mut self, position: u32, text: &str, tokenizer: Tokenizer) {
        let tokens = tokenizer.tokenize(text);
        let doc_len = tokens.len() as u32;

        let idx = position as usize;
        if idx >= self.doc_lengths.len() {
            self.doc_lengths.resize(idx + 1, 0);
        }
        self.doc_lengths[idx] = doc_len;
        self.doc_count += 1;
        self.total_doc_length += doc_len as u64;

        let mut tf_map: HashMap<&str, u32> = HashMap::new();
        for token in tokens.iter() {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in tf_map {
            self.index
                .entry(term.to_string())
                .or_default()
                .push(Posting {
                    doc_id: position,
                    term_frequency: tf,
                });
        }
    }

    /// Number of documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.index.get(term).map_or(0, Vec::len)
    }

    /// Returns the average document length across all indexed documents.
    pub fn average_doc_length(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_doc_length as f32 / self.doc_count as f32
    }
}
