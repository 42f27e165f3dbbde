//! Segment storage for the fingerprint inverted index
//!
//! A segment is an immutable, sorted, duplicate-free set of
//! `(key, value)` postings kept as two files: a data file of delta-encoded
//! blocks and an index file mapping each block's first key to its offset.
//!
//! # Architecture
//!
//! - `BlockIndexWriter` / `SegmentIndex`: the skip index, written and loaded
//! - `SegmentDataWriter` / `SegmentDataReader`: block-encoded posting data
//! - `SegmentCursor`: ordered, seekable iteration over one segment
//! - `SegmentMerger`: k-way merge of sorted sources into a new segment
//! - `SegmentStore`: segment file pairs inside a `Directory`

mod types;
mod codec;
mod index_writer;
mod index;
mod data_writer;
mod data_reader;
mod cursor;
mod merge;
mod store;

pub use types::*;
pub use codec::*;
pub use index_writer::*;
pub use index::*;
pub use data_writer::*;
pub use data_reader::*;
pub use cursor::*;
pub use merge::*;
pub use store::*;
