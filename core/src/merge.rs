//! Additive merge of flushed segments into the final index.
//!
//! Any read failure aborts the merge: a weight sum missing one segment is
//! indistinguishable from a correct one once written.

use rayon::prelude::*;

use crate::index::InvertedIndex;
use crate::segment::{SegmentId, SegmentStore};
use crate::{Error, Result};

fn load<S: SegmentStore + ?Sized>(store: &S, id: SegmentId) -> Result<InvertedIndex> {
    match store.read(id) {
        Ok(segment) => Ok(segment.postings),
        Err(e) => {
            tracing::error!(segment = %id, error = %e, "segment read failed, aborting merge");
            Err(Error::segment_read(id, e))
        }
    }
}

/// Read each segment in turn and sum its weights into one index.
pub fn merge_segments<S: SegmentStore + ?Sized>(store: &S, ids: &[SegmentId]) -> Result<InvertedIndex> {
    let mut merged = InvertedIndex::new();
    for &id in ids {
        merged.absorb(load(store, id)?);
        tracing::debug!(segment = %id, terms = merged.len(), "merged segment");
    }
    tracing::info!(segments = ids.len(), terms = merged.len(), postings = merged.posting_count(), "merge complete");
    Ok(merged)
}

/// Same result as [`merge_segments`], reading and reducing segments on the
/// rayon pool. Floating point sums may differ in the last bits from the
/// sequential order when more than two segments share a posting.
pub fn merge_segments_parallel<S: SegmentStore + ?Sized>(store: &S, ids: &[SegmentId]) -> Result<InvertedIndex> {
    let merged = ids
        .par_iter()
        .map(|&id| load(store, id))
        .try_reduce(InvertedIndex::new, |mut a, b| {
            // fold the smaller side into the larger one
            if a.posting_count() < b.posting_count() {
                let mut b = b;
                b.absorb(a);
                return Ok(b);
            }
            a.absorb(b);
            Ok(a)
        })?;
    tracing::info!(segments = ids.len(), terms = merged.len(), postings = merged.posting_count(), "parallel merge complete");
    Ok(merged)
}
