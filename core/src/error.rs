use thiserror::Error;

use crate::segment::SegmentId;

/// Errors produced by the indexing and retrieval engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Segment {0} already exists")]
    SegmentExists(SegmentId),

    #[error("Segment {0} not found")]
    SegmentNotFound(SegmentId),

    #[error("Segment {id} is corrupt: {reason}")]
    SegmentCorrupt { id: SegmentId, reason: String },

    #[error("Failed to write segment {id}: {source}")]
    SegmentWrite {
        id: SegmentId,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to read segment {id}: {source}")]
    SegmentRead {
        id: SegmentId,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A segment that could not be written ends the ingestion run; segments
    /// already on storage are left in place.
    pub fn is_fatal_to_ingestion(&self) -> bool {
        matches!(self, Error::SegmentWrite { .. })
    }

    pub(crate) fn segment_write(id: SegmentId, source: Error) -> Self {
        Error::SegmentWrite { id, source: Box::new(source) }
    }

    pub(crate) fn segment_read(id: SegmentId, source: Error) -> Self {
        match source {
            // already carries the id
            e @ Error::SegmentRead { .. } => e,
            other => Error::SegmentRead { id, source: Box::new(other) },
        }
    }
}
