use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable document key, typically the page path relative to the corpus root.
pub type DocId = String;
pub type Term = String;
pub type Weight = f64;

/// Weights for one term keyed by document. A document absent from the map
/// has weight zero for the term.
pub type PostingList = HashMap<DocId, Weight>;

/// Euclidean norm of each document's raw term-frequency vector.
pub type DocLengths = HashMap<DocId, f64>;

/// Term to posting list. Holds at most one accumulated weight per
/// (term, document) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: HashMap<Term, PostingList>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Add `weight` to the entry for (term, doc), treating a missing entry as zero.
    pub fn accumulate(&mut self, term: &str, doc_id: &str, weight: Weight) {
        if let Some(list) = self.postings.get_mut(term) {
            match list.get_mut(doc_id) {
                Some(w) => *w += weight,
                None => { list.insert(doc_id.to_string(), weight); }
            }
            return;
        }
        let mut list = PostingList::new();
        list.insert(doc_id.to_string(), weight);
        self.postings.insert(term.to_string(), list);
    }

    /// Fold every posting of `other` into `self` by addition.
    pub fn absorb(&mut self, other: InvertedIndex) {
        for (term, list) in other.postings {
            match self.postings.get_mut(&term) {
                Some(existing) => {
                    for (doc_id, weight) in list {
                        *existing.entry(doc_id).or_insert(0.0) += weight;
                    }
                }
                None => { self.postings.insert(term, list); }
            }
        }
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> { self.postings.get(term) }

    /// Weight of (term, doc), zero when either is absent.
    pub fn weight(&self, term: &str, doc_id: &str) -> Weight {
        self.postings
            .get(term)
            .and_then(|list| list.get(doc_id))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }

    /// Number of distinct terms.
    pub fn len(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.postings.is_empty() }

    pub fn posting_count(&self) -> usize { self.postings.values().map(|l| l.len()).sum() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.postings.iter().map(|(t, l)| (t.as_str(), l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_adds_instead_of_overwriting() {
        let mut idx = InvertedIndex::new();
        idx.accumulate("cat", "d1", 1.0);
        idx.accumulate("cat", "d1", 0.5);
        assert_eq!(idx.weight("cat", "d1"), 1.5);
        assert_eq!(idx.posting_count(), 1);
    }

    #[test]
    fn absent_pairs_weigh_zero() {
        let mut idx = InvertedIndex::new();
        idx.accumulate("cat", "d1", 1.0);
        assert_eq!(idx.weight("cat", "d2"), 0.0);
        assert_eq!(idx.weight("dog", "d1"), 0.0);
    }

    #[test]
    fn absorb_sums_overlapping_postings() {
        let mut a = InvertedIndex::new();
        a.accumulate("cat", "d1", 1.0);
        let mut b = InvertedIndex::new();
        b.accumulate("cat", "d1", 1.0);
        b.accumulate("dog", "d2", 0.75);
        a.absorb(b);
        assert_eq!(a.weight("cat", "d1"), 2.0);
        assert_eq!(a.weight("dog", "d2"), 0.75);
        assert_eq!(a.len(), 2);
    }
}
