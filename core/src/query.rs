//! Boolean-AND retrieval and ranking over the final index.
//!
//! Query terms missing from the index are skipped rather than forcing an
//! empty result, so `"cat bird"` with no `bird` postings matches every
//! document containing `cat`.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::SearchConfig;
use crate::index::{InvertedIndex, Weight};
use crate::ingest::UrlTable;
use crate::persist::{load_final_index, load_meta, load_urls, IndexPaths};
use crate::tokenizer::Normalizer;
use crate::Result;

pub const URL_NOT_FOUND: &str = "URL not found";

/// Documents containing every query term that exists in the index.
pub fn boolean_and<'a>(index: &'a InvertedIndex, terms: &[String]) -> BTreeSet<&'a str> {
    let mut lists: Vec<_> = terms.iter().filter_map(|t| index.postings(t)).collect();
    // drive the intersection from the shortest list
    lists.sort_by_key(|l| l.len());
    let Some((&first, rest)) = lists.split_first() else {
        return BTreeSet::new();
    };
    first
        .keys()
        .filter(|doc| rest.iter().all(|l| l.contains_key(doc.as_str())))
        .map(|doc| doc.as_str())
        .collect()
}

/// Score each match by the sum of its query-term weights and keep the best
/// `k`. Ties are broken by ascending DocID. Repeated query terms count once
/// per occurrence.
pub fn rank<'a>(
    index: &InvertedIndex,
    matches: &BTreeSet<&'a str>,
    terms: &[String],
    k: usize,
) -> Vec<(&'a str, Weight)> {
    let mut scored: Vec<(&'a str, Weight)> = matches
        .iter()
        .map(|&doc| {
            let score: Weight = terms.iter().map(|t| index.weight(t, doc)).sum();
            (doc, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.truncate(k);
    scored
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub url: String,
    pub score: Weight,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// Size of the boolean result set before truncation
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

/// Read-only query engine over a merged index. Safe to share across threads.
#[derive(Debug)]
pub struct Searcher {
    index: InvertedIndex,
    urls: UrlTable,
    normalizer: Normalizer,
    config: SearchConfig,
}

impl Searcher {
    pub fn new(index: InvertedIndex, urls: UrlTable, normalizer: Normalizer, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { index, urls, normalizer, config })
    }

    /// Load a final index directory, normalizing queries the way it was built.
    pub fn open(paths: &IndexPaths, config: SearchConfig) -> Result<Self> {
        let meta = load_meta(paths)?;
        let index = load_final_index(paths)?;
        let urls = load_urls(paths)?;
        tracing::info!(terms = index.len(), docs = meta.num_docs, "opened index");
        Self::new(index, urls, Normalizer::new(meta.normalizer), config)
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn normalize(&self, query: &str) -> Vec<String> { self.normalizer.normalize(query) }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.search_k(query, None).hits
    }

    /// Top `k` hits (clamped to the configured bounds), best first.
    pub fn search_k(&self, query: &str, k: Option<usize>) -> SearchResults {
        let terms = self.normalize(query);
        let matches = boolean_and(&self.index, &terms);
        let k = self.config.effective_k(k);
        let hits = rank(&self.index, &matches, &terms, k)
            .into_iter()
            .map(|(doc, score)| SearchHit {
                doc_id: doc.to_string(),
                url: self.urls.get(doc).cloned().unwrap_or_else(|| URL_NOT_FOUND.to_string()),
                score,
            })
            .collect();
        tracing::debug!(query, terms = terms.len(), total_hits = matches.len(), "search");
        SearchResults { total_hits: matches.len(), hits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

    fn sample() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.accumulate("cat", "D1", 1.0);
        idx.accumulate("dog", "D1", 0.75);
        idx.accumulate("dog", "D2", 2.0);
        idx
    }

    #[test]
    fn intersection_requires_all_known_terms() {
        let idx = sample();
        let got = boolean_and(&idx, &terms(&["cat", "dog"]));
        assert_eq!(got.into_iter().collect::<Vec<_>>(), vec!["D1"]);
    }

    #[test]
    fn unknown_terms_are_skipped() {
        let idx = sample();
        let got = boolean_and(&idx, &terms(&["cat", "bird"]));
        assert_eq!(got.into_iter().collect::<Vec<_>>(), vec!["D1"]);
        assert!(boolean_and(&idx, &terms(&["bird"])).is_empty());
        assert!(boolean_and(&idx, &[]).is_empty());
    }

    #[test]
    fn rank_orders_by_score_then_doc_id() {
        let mut idx = sample();
        idx.accumulate("dog", "D0", 0.75);
        let matches = boolean_and(&idx, &terms(&["dog"]));
        let ranked = rank(&idx, &matches, &terms(&["dog"]), 5);
        assert_eq!(ranked, vec![("D2", 2.0), ("D0", 0.75), ("D1", 0.75)]);
        assert_eq!(rank(&idx, &matches, &terms(&["dog"]), 1).len(), 1);
    }

    #[test]
    fn missing_url_uses_sentinel() {
        let searcher = Searcher::new(sample(), UrlTable::new(), Normalizer::default(), SearchConfig::default()).unwrap();
        let hits = searcher.search("dog");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "D2");
        assert_eq!(hits[0].url, URL_NOT_FOUND);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let searcher = Searcher::new(sample(), UrlTable::new(), Normalizer::default(), SearchConfig::default()).unwrap();
        assert!(searcher.search("").is_empty());
        assert!(searcher.search("?!").is_empty());
        assert_eq!(searcher.search_k("zebra", None).total_hits, 0);
    }
}
