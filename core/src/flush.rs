use crate::builder::Accumulator;
use crate::index::DocLengths;
use crate::segment::{Segment, SegmentId, SegmentSequence, SegmentStore};
use crate::{Error, Result};

/// What one flush controller produced over an ingestion run.
#[derive(Debug, Default)]
pub struct FlushOutcome {
    /// Segment ids in creation order
    pub segments: Vec<SegmentId>,
    pub doc_lengths: DocLengths,
    pub processed: u64,
}

/// Bounds memory by writing the accumulator's index to a new segment every
/// `batch_size` processed documents.
pub struct FlushController<'a, S: SegmentStore + ?Sized> {
    store: &'a S,
    sequence: &'a SegmentSequence,
    batch_size: usize,
    accumulator: Accumulator,
    processed: u64,
    since_flush: usize,
    segments: Vec<SegmentId>,
}

impl<'a, S: SegmentStore + ?Sized> FlushController<'a, S> {
    pub fn new(store: &'a S, sequence: &'a SegmentSequence, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        Ok(Self {
            store,
            sequence,
            batch_size,
            accumulator: Accumulator::new(),
            processed: 0,
            since_flush: 0,
            segments: Vec::new(),
        })
    }

    /// Count one processed document, folding its tokens into the accumulator,
    /// and flush if the batch is full. Documents without tokens still count.
    pub fn record(&mut self, doc_id: &str, body: &[String], key: &[String]) -> Result<Option<SegmentId>> {
        self.accumulator.add_document(doc_id, body, key);
        self.processed += 1;
        self.since_flush += 1;
        if self.processed % 500 == 0 {
            tracing::debug!(processed = self.processed, "processed documents");
        }
        if self.since_flush >= self.batch_size {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// Write the current index as a new segment and clear it. A write failure
    /// is returned as [`Error::SegmentWrite`]; earlier segments stay on storage.
    pub fn flush(&mut self) -> Result<SegmentId> {
        let id = self.sequence.next_id();
        let segment = Segment {
            id,
            num_docs: self.since_flush as u32,
            postings: self.accumulator.take_index(),
        };
        let terms = segment.postings.len();
        if let Err(e) = self.store.write(&segment) {
            tracing::error!(segment = %id, error = %e, "segment write failed");
            return Err(Error::segment_write(id, e));
        }
        tracing::info!(segment = %id, docs = segment.num_docs, terms, "flushed segment");
        self.segments.push(id);
        self.since_flush = 0;
        Ok(id)
    }

    pub fn processed(&self) -> u64 { self.processed }

    pub fn accumulator(&self) -> &Accumulator { &self.accumulator }

    /// Flush the trailing partial batch, if it holds any postings.
    pub fn finish(mut self) -> Result<FlushOutcome> {
        if !self.accumulator.index().is_empty() {
            self.flush()?;
        }
        Ok(FlushOutcome {
            segments: self.segments,
            doc_lengths: self.accumulator.into_doc_lengths(),
            processed: self.processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::FsSegmentStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    fn toks(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

    #[test]
    fn flushes_every_batch_and_the_remainder() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let mut ctl = FlushController::new(&store, &seq, 2).unwrap();
        let mut flushed = Vec::new();
        for i in 0..5 {
            if let Some(id) = ctl.record(&format!("d{i}"), &toks(&["cat"]), &[]).unwrap() {
                flushed.push(id);
            }
        }
        assert_eq!(flushed, vec![SegmentId(1), SegmentId(2)]);
        let out = ctl.finish().unwrap();
        assert_eq!(out.segments, vec![SegmentId(1), SegmentId(2), SegmentId(3)]);
        assert_eq!(out.processed, 5);
        assert_eq!(out.doc_lengths.len(), 5);
        assert_eq!(store.read(SegmentId(3)).unwrap().num_docs, 1);
    }

    #[test]
    fn exact_multiple_leaves_no_trailing_segment() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let mut ctl = FlushController::new(&store, &seq, 2).unwrap();
        ctl.record("a", &toks(&["x"]), &[]).unwrap();
        ctl.record("b", &toks(&["y"]), &[]).unwrap();
        assert!(ctl.accumulator().index().is_empty());
        let out = ctl.finish().unwrap();
        assert_eq!(out.segments.len(), 1);
    }

    #[test]
    fn empty_documents_count_towards_the_batch() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        let mut ctl = FlushController::new(&store, &seq, 2).unwrap();
        ctl.record("a", &toks(&["x"]), &[]).unwrap();
        let flushed = ctl.record("b", &[], &[]).unwrap();
        assert_eq!(flushed, Some(SegmentId(1)));
        assert_eq!(ctl.processed(), 2);
    }

    struct FailingStore {
        fail: AtomicBool,
        inner: FsSegmentStore,
    }

    impl SegmentStore for FailingStore {
        fn write(&self, segment: &Segment) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
            }
            self.inner.write(segment)
        }
        fn read(&self, id: SegmentId) -> Result<Segment> { self.inner.read(id) }
        fn list(&self) -> Result<Vec<SegmentId>> { self.inner.list() }
    }

    #[test]
    fn write_failure_is_fatal_and_keeps_earlier_segments() {
        let dir = tempdir().unwrap();
        let store = FailingStore { fail: AtomicBool::new(false), inner: FsSegmentStore::open(dir.path()).unwrap() };
        let seq = SegmentSequence::new();
        let mut ctl = FlushController::new(&store, &seq, 1).unwrap();
        ctl.record("a", &toks(&["x"]), &[]).unwrap();
        store.fail.store(true, Ordering::SeqCst);
        let err = ctl.record("b", &toks(&["y"]), &[]).unwrap_err();
        assert!(err.is_fatal_to_ingestion());
        assert_eq!(store.list().unwrap(), vec![SegmentId(1)]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempdir().unwrap();
        let store = FsSegmentStore::open(dir.path()).unwrap();
        let seq = SegmentSequence::new();
        assert!(FlushController::new(&store, &seq, 0).is_err());
    }
}
