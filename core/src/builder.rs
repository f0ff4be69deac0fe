//! Per-document term weighting.
//!
//! `weight = 0.5 + 0.5 * freq / max_freq`, doubled when the term also shows up
//! in the document's key text. Document length is the Euclidean norm of the
//! raw frequencies.

use std::collections::{HashMap, HashSet};

use crate::index::{DocId, DocLengths, InvertedIndex, Weight};

/// Multiplier applied once to terms that occur anywhere in key text.
pub const KEY_TEXT_BOOST: Weight = 2.0;

/// Augmented term frequency for a term seen `freq` times when the most
/// frequent term of the document was seen `max_freq` times.
pub fn term_weight(freq: u32, max_freq: u32) -> Weight {
    0.5 + 0.5 * (freq as Weight / max_freq as Weight)
}

/// In-memory state owned by one ingestion pipeline between flushes.
#[derive(Debug, Default)]
pub struct Accumulator {
    index: InvertedIndex,
    doc_lengths: DocLengths,
}

impl Accumulator {
    pub fn new() -> Self { Self::default() }

    /// Fold one document into the index. Returns false when the body had no
    /// tokens, in which case nothing is recorded.
    pub fn add_document(&mut self, doc_id: &str, body: &[String], key: &[String]) -> bool {
        let mut freq: HashMap<&str, u32> = HashMap::new();
        for token in body {
            *freq.entry(token.as_str()).or_insert(0) += 1;
        }
        let Some(&max_freq) = freq.values().max() else {
            return false;
        };
        let key_terms: HashSet<&str> = key.iter().map(|t| t.as_str()).collect();

        for (&term, &f) in &freq {
            let mut weight = term_weight(f, max_freq);
            if key_terms.contains(term) {
                weight *= KEY_TEXT_BOOST;
            }
            self.index.accumulate(term, doc_id, weight);
        }

        let sum_sq: f64 = freq.values().map(|&f| (f as f64) * (f as f64)).sum();
        self.doc_lengths.insert(doc_id.to_string(), sum_sq.sqrt());
        true
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn doc_length(&self, doc_id: &str) -> Option<f64> { self.doc_lengths.get(doc_id).copied() }

    /// Hand the current index over as an immutable snapshot and start a new
    /// generation. Document lengths are kept for the whole run.
    pub fn take_index(&mut self) -> InvertedIndex { std::mem::take(&mut self.index) }

    pub fn into_doc_lengths(self) -> DocLengths { self.doc_lengths }
}

/// Lengths produced by disjoint shards, combined.
pub fn merge_doc_lengths(parts: impl IntoIterator<Item = DocLengths>) -> DocLengths {
    let mut out: HashMap<DocId, f64> = HashMap::new();
    for part in parts {
        out.extend(part);
    }
    out
}
