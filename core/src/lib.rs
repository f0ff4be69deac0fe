//! Disk-assisted term-weighted inverted index with boolean-AND ranked retrieval.
//!
//! Ingestion folds documents into an [`builder::Accumulator`], a
//! [`flush::FlushController`] writes it out as immutable segments every batch,
//! [`merge::merge_segments`] sums the segments into the final index and a
//! [`query::Searcher`] answers queries against it.

pub mod builder;
pub mod config;
pub mod error;
pub mod extract;
pub mod flush;
pub mod index;
pub mod ingest;
pub mod merge;
pub mod persist;
pub mod query;
pub mod segment;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::{DocId, DocLengths, InvertedIndex, PostingList, Term, Weight};
pub use ingest::{IngestReport, RawDocument, UrlTable};
pub use query::{SearchHit, Searcher};
pub use segment::{SegmentId, SegmentStore};
