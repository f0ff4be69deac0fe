use rayon::prelude::*;
use std::collections::HashMap;

use crate::builder::merge_doc_lengths;
use crate::extract::TextExtractor;
use crate::flush::FlushController;
use crate::index::{DocId, DocLengths};
use crate::segment::{SegmentId, SegmentSequence, SegmentStore};
use crate::tokenizer::Normalizer;
use crate::Result;

/// DocID to external URL, filled during ingestion and read-only afterwards.
pub type UrlTable = HashMap<DocId, String>;

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub doc_id: DocId,
    pub url: String,
    pub content: String,
}

/// Totals for a finished ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Segment ids in creation order
    pub segments: Vec<SegmentId>,
    pub doc_lengths: DocLengths,
    pub urls: UrlTable,
    pub processed: u64,
    /// Documents the source could not deliver
    pub skipped: u64,
}

/// Runs documents through extraction, normalization and weighting, flushing
/// segments as batches fill.
pub struct Ingestor<'a, S: SegmentStore + ?Sized, E: TextExtractor + ?Sized> {
    normalizer: &'a Normalizer,
    extractor: &'a E,
    controller: FlushController<'a, S>,
    urls: UrlTable,
    skipped: u64,
}

impl<'a, S: SegmentStore + ?Sized, E: TextExtractor + ?Sized> Ingestor<'a, S, E> {
    pub fn new(
        store: &'a S,
        sequence: &'a SegmentSequence,
        batch_size: usize,
        normalizer: &'a Normalizer,
        extractor: &'a E,
    ) -> Result<Self> {
        Ok(Self {
            normalizer,
            extractor,
            controller: FlushController::new(store, sequence, batch_size)?,
            urls: UrlTable::new(),
            skipped: 0,
        })
    }

    /// Ingest one delivered document. Extraction failures are logged and the
    /// document is indexed as empty; only segment write failures propagate.
    pub fn ingest(&mut self, doc: RawDocument) -> Result<()> {
        let extracted = match self.extractor.extract(&doc.content) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(doc_id = %doc.doc_id, error = %e, "extraction failed, indexing as empty");
                Default::default()
            }
        };
        let body = self.normalizer.normalize(&extracted.body);
        let key = self.normalizer.normalize(&extracted.key);
        self.controller.record(&doc.doc_id, &body, &key)?;
        self.urls.insert(doc.doc_id, doc.url);
        Ok(())
    }

    /// Record a document the source failed to deliver.
    pub fn skip(&mut self, doc_id: &str, reason: &dyn std::fmt::Display) {
        tracing::warn!(doc_id, error = %reason, "skipping unreadable document");
        self.skipped += 1;
    }

    /// Drain a source whose items are either documents or per-document
    /// read failures.
    pub fn ingest_all<I, R>(&mut self, source: I) -> Result<()>
    where
        I: IntoIterator<Item = std::result::Result<RawDocument, SkippedDocument<R>>>,
        R: std::fmt::Display,
    {
        for item in source {
            match item {
                Ok(doc) => self.ingest(doc)?,
                Err(skipped) => self.skip(&skipped.doc_id, &skipped.reason),
            }
        }
        Ok(())
    }

    pub fn processed(&self) -> u64 { self.controller.processed() }

    pub fn finish(self) -> Result<IngestReport> {
        let outcome = self.controller.finish()?;
        tracing::info!(
            processed = outcome.processed,
            skipped = self.skipped,
            segments = outcome.segments.len(),
            "ingestion finished"
        );
        Ok(IngestReport {
            segments: outcome.segments,
            doc_lengths: outcome.doc_lengths,
            urls: self.urls,
            processed: outcome.processed,
            skipped: self.skipped,
        })
    }
}

/// A document the source could not read.
#[derive(Debug)]
pub struct SkippedDocument<R> {
    pub doc_id: DocId,
    pub reason: R,
}

/// Ingest each source on its own shard, concurrently. Shards keep private
/// accumulators and flush their own segments into the shared store; ids come
/// from the shared sequence so they never collide.
pub fn ingest_sharded<S, E, I, R>(
    store: &S,
    sequence: &SegmentSequence,
    batch_size: usize,
    normalizer: &Normalizer,
    extractor: &E,
    sources: Vec<I>,
) -> Result<IngestReport>
where
    S: SegmentStore + ?Sized,
    E: TextExtractor + ?Sized,
    I: IntoIterator<Item = std::result::Result<RawDocument, SkippedDocument<R>>> + Send,
    R: std::fmt::Display,
{
    let shards = sources.len();
    let reports: Vec<IngestReport> = sources
        .into_par_iter()
        .enumerate()
        .map(|(shard, source)| {
            let mut ingestor = Ingestor::new(store, sequence, batch_size, normalizer, extractor)?;
            ingestor.ingest_all(source)?;
            tracing::debug!(shard, processed = ingestor.processed(), "shard drained");
            ingestor.finish()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut combined = IngestReport::default();
    let mut lengths = Vec::with_capacity(shards);
    for report in reports {
        combined.segments.extend(report.segments);
        combined.urls.extend(report.urls);
        combined.processed += report.processed;
        combined.skipped += report.skipped;
        lengths.push(report.doc_lengths);
    }
    combined.segments.sort();
    combined.doc_lengths = merge_doc_lengths(lengths);
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extracted, PlainTextExtractor};
    use crate::segment::FsSegmentStore;
    use crate::{Error, Result};
    use tempfile::tempdir;

    fn doc(id: &str, content: &str) -> RawDocument {
        RawDocument { doc_id: id.into(), url: format!("https://example.com/{id}"), content: content.into() }
    }

    struct Failing;
    impl TextExtractor for Failing {
        fn extract(&self, _raw: &str) -> Result<Extracted> { Err(Error::Extraction("broken".into())) }
    }

    #[test]
    fn extraction_failure_counts_but_adds_no_postings() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let normalizer = Normalizer::default();
        let mut ing = Ingestor::new(&store, &seq, 10, &normalizer, &Failing).unwrap();
        ing.ingest(doc("a", "cat")).unwrap();
        let report = ing.finish().unwrap();
        assert_eq!(report.processed, 1);
        assert!(report.segments.is_empty());
        assert_eq!(report.urls["a"], "https://example.com/a");
    }

    #[test]
    fn unreadable_documents_are_skipped() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let normalizer = Normalizer::default();
        let mut ing = Ingestor::new(&store, &seq, 10, &normalizer, &PlainTextExtractor).unwrap();
        let source = vec![
            Ok(doc("a", "cat dog")),
            Err(SkippedDocument { doc_id: "b".into(), reason: "bad json" }),
        ];
        ing.ingest_all(source).unwrap();
        let report = ing.finish().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!report.urls.contains_key("b"));
    }

    #[test]
    fn shards_write_distinct_segments() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let normalizer = Normalizer::default();
        let shard = |prefix: &str| -> Vec<std::result::Result<RawDocument, SkippedDocument<String>>> {
            (0..3).map(|i| Ok(doc(&format!("{prefix}{i}"), "cat"))).collect()
        };
        let report = ingest_sharded(&store, &seq, 2, &normalizer, &PlainTextExtractor, vec![shard("x"), shard("y")]).unwrap();
        assert_eq!(report.processed, 6);
        assert_eq!(report.segments.len(), 4);
        assert_eq!(report.segments, store.list().unwrap());
        assert_eq!(report.doc_lengths.len(), 6);
        assert_eq!(report.urls.len(), 6);
    }
}
