//! Core types for segment storage

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier (monotonically increasing per index)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Name of the block index file for this segment
    pub fn index_file_name(&self) -> String {
        format!("{}.fii", self)
    }

    /// Name of the posting data file for this segment
    pub fn data_file_name(&self) -> String {
        format!("{}.fid", self)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment_{}", self.0)
    }
}

/// A fingerprint sub-hash mapped to a track identifier.
///
/// Postings order lexicographically by `(key, value)`; the pair is the unit
/// of identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Posting {
    pub key: u32,
    pub value: u32,
}

impl Posting {
    pub fn new(key: u32, value: u32) -> Self {
        Self { key, value }
    }
}

impl From<(u32, u32)> for Posting {
    fn from((key, value): (u32, u32)) -> Self {
        Self { key, value }
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.key, self.value)
    }
}

/// Skip-index entry: the first key of a block and the block's byte offset
/// in the data file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub first_key: u32,
    pub block_offset: u64,
}

impl IndexEntry {
    pub fn new(first_key: u32, block_offset: u64) -> Self {
        Self {
            first_key,
            block_offset,
        }
    }
}
