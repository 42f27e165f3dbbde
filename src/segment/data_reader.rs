//! Segment data reader
//!
//! Reverses the data writer's block encoding. The reader only knows the
//! block size; block boundaries are found by counting postings, and a
//! block's first key is read back as an absolute value.

use std::io::{Read, Seek, SeekFrom};

use super::codec::read_vbyte;
use super::types::Posting;
use crate::error::{FpIndexError, Result};

/// Decodes postings from a segment data file
pub struct SegmentDataReader<R: Read + Seek> {
    input: R,
    block_size: u32,
    /// Offset of the next unread byte
    position: u64,
    /// Offset where the current block starts
    block_offset: u64,
    /// Postings decoded from the current block
    in_block: u32,
    last_key: u32,
}

impl<R: Read + Seek> SegmentDataReader<R> {
    /// Create a reader over a stream positioned at the start of the data file
    pub fn new(input: R, block_size: u32) -> Self {
        Self {
            input,
            block_size,
            position: 0,
            block_offset: 0,
            in_block: 0,
            last_key: 0,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Offset of the block the last returned posting belongs to
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    /// How many postings of the current block have been returned; 1 right
    /// after the first posting of a block
    pub fn postings_in_block(&self) -> u32 {
        self.in_block
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reposition to the start of the block at `block_offset`
    pub fn seek_to_block(&mut self, block_offset: u64) -> Result<()> {
        self.input.seek(SeekFrom::Start(block_offset))?;
        self.position = block_offset;
        self.block_offset = block_offset;
        self.in_block = 0;
        self.last_key = 0;
        Ok(())
    }

    /// Decode the next posting. `Ok(None)` marks the end of the data; a
    /// posting cut short is corruption.
    pub fn next(&mut self) -> Result<Option<Posting>> {
        if self.in_block == self.block_size {
            self.in_block = 0;
            self.block_offset = self.position;
        }

        let key_field = match read_vbyte(&mut self.input, &mut self.position)? {
            Some(field) => field,
            None => return Ok(None),
        };
        let key = if self.in_block == 0 {
            key_field
        } else {
            self.last_key.checked_add(key_field).ok_or_else(|| {
                FpIndexError::corruption(format!(
                    "key delta {} overflows at offset {}",
                    key_field, self.position
                ))
            })?
        };
        let value = read_vbyte(&mut self.input, &mut self.position)?.ok_or_else(|| {
            FpIndexError::corruption(format!(
                "posting truncated after key {} at offset {}",
                key, self.position
            ))
        })?;

        self.in_block += 1;
        self.last_key = key;
        Ok(Some(Posting::new(key, value)))
    }
}
