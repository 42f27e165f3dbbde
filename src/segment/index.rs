//! In-memory skip index of a segment
//!
//! Loaded once from the index file and immutable afterwards. Maps the first
//! key of every data block to the block's offset so a cursor can jump
//! straight to the block that may hold a key.

use std::io::Read;

use tracing::debug;

use super::codec::{decode_vbyte, decode_vbyte_u64};
use super::index_writer::INDEX_HEADER_LEN;
use super::types::IndexEntry;
use crate::error::{FpIndexError, Result};

/// Fully loaded block index of one segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentIndex {
    block_size: u32,
    entries: Vec<IndexEntry>,
}

impl SegmentIndex {
    /// Read and parse a whole index file
    pub fn load<R: Read>(input: R) -> Result<Self> {
        BlockIndexReader::new(input).read()
    }

    /// Parse an index from its serialized bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < INDEX_HEADER_LEN {
            return Err(FpIndexError::corruption(format!(
                "index truncated: {} bytes, header needs {}",
                data.len(),
                INDEX_HEADER_LEN
            )));
        }
        let block_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let entry_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

        if block_size == 0 {
            return Err(FpIndexError::corruption("index block size is zero"));
        }
        // Every entry takes at least two bytes
        let body_len = data.len() - INDEX_HEADER_LEN;
        if entry_count > body_len / 2 {
            return Err(FpIndexError::corruption(format!(
                "index declares {} entries but holds only {} bytes",
                entry_count, body_len
            )));
        }

        let mut pos = INDEX_HEADER_LEN;
        let mut entries: Vec<IndexEntry> = Vec::with_capacity(entry_count);
        let mut prev_key = 0u32;
        for i in 0..entry_count {
            let delta = decode_vbyte(data, &mut pos)?;
            let first_key = prev_key.checked_add(delta).ok_or_else(|| {
                FpIndexError::corruption(format!("index entry {} key overflows", i))
            })?;
            let block_offset = decode_vbyte_u64(data, &mut pos)?;

            match entries.last() {
                None if block_offset != 0 => {
                    return Err(FpIndexError::corruption(format!(
                        "first block starts at offset {}",
                        block_offset
                    )));
                }
                Some(last) if block_offset <= last.block_offset => {
                    return Err(FpIndexError::corruption(format!(
                        "index entry {} offset {} does not follow {}",
                        i, block_offset, last.block_offset
                    )));
                }
                _ => {}
            }

            entries.push(IndexEntry::new(first_key, block_offset));
            prev_key = first_key;
        }

        if pos != data.len() {
            return Err(FpIndexError::corruption(format!(
                "index entry count mismatch: {} trailing bytes after {} entries",
                data.len() - pos,
                entry_count
            )));
        }

        Ok(Self {
            block_size,
            entries,
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of blocks in the segment
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, block: usize) -> Option<&IndexEntry> {
        self.entries.get(block)
    }

    /// First key stored in the segment
    pub fn first_key(&self) -> Option<u32> {
        self.entries.first().map(|e| e.first_key)
    }

    /// Find the block where the first posting with a key `>= key` can start.
    ///
    /// That is the last block whose first key is strictly below `key`, or
    /// block 0 when no such block exists. A key may span several blocks,
    /// so a block whose first key equals `key` can still be preceded by
    /// postings of the same key. Returns `None` for an empty segment.
    pub fn find_block(&self, key: u32) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let after = self.entries.partition_point(|e| e.first_key < key);
        Some(after.saturating_sub(1))
    }
}

/// Parses an index file into a `SegmentIndex`
pub struct BlockIndexReader<R: Read> {
    input: R,
}

impl<R: Read> BlockIndexReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Read the whole stream in one pass and decode it
    pub fn read(mut self) -> Result<SegmentIndex> {
        let mut data = Vec::new();
        self.input.read_to_end(&mut data)?;
        let index = SegmentIndex::decode(&data)?;
        debug!(
            blocks = index.len(),
            block_size = index.block_size(),
            "Segment index loaded"
        );
        Ok(index)
    }
}
