//! Block index writer
//!
//! Accumulates one entry per data block and serializes them on finalize:
//!
//! ```text
//! block_size:  u32 LE
//! entry_count: u32 LE
//! entry_count x { first_key_delta: vbyte, block_offset: vbyte }
//! ```
//!
//! The first entry's key delta is taken against zero, so it is absolute.

use std::io::Write;

use tracing::{debug, warn};

use super::codec::{encode_vbyte, encode_vbyte_u64};
use super::types::IndexEntry;
use crate::config::validate_block_size;
use crate::error::{FpIndexError, Result};

/// Fixed-width header: block size + entry count
pub const INDEX_HEADER_LEN: usize = 8;

/// Writer for a segment's skip index
pub struct BlockIndexWriter<W: Write> {
    output: Option<W>,
    block_size: Option<u32>,
    entries: Vec<IndexEntry>,
    finalized: bool,
}

impl<W: Write> BlockIndexWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: Some(output),
            block_size: None,
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Set the number of postings per block.
    ///
    /// Reconfiguring with the same value is allowed; changing the value once
    /// an entry has been recorded is not.
    pub fn configure(&mut self, block_size: u32) -> Result<()> {
        validate_block_size(block_size)?;
        let in_use = !self.entries.is_empty() || self.finalized;
        match self.block_size {
            Some(current) if current != block_size && in_use => {
                Err(FpIndexError::InvalidConfig(format!(
                    "block size cannot change from {} to {} after use",
                    current, block_size
                )))
            }
            _ => {
                self.block_size = Some(block_size);
                Ok(())
            }
        }
    }

    pub fn block_size(&self) -> Option<u32> {
        self.block_size
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append the entry for a block starting at `block_offset` with `first_key`
    pub fn record_block_start(&mut self, first_key: u32, block_offset: u64) -> Result<()> {
        if self.block_size.is_none() {
            return Err(FpIndexError::InvalidConfig(
                "block index writer used before configure".to_string(),
            ));
        }
        if self.finalized || self.output.is_none() {
            return Err(FpIndexError::InvalidConfig(
                "block index writer already finalized".to_string(),
            ));
        }
        if let Some(last) = self.entries.last() {
            if first_key < last.first_key {
                return Err(FpIndexError::InvalidSequence(format!(
                    "block first key {} is below previous first key {}",
                    first_key, last.first_key
                )));
            }
            if block_offset <= last.block_offset {
                return Err(FpIndexError::InvalidSequence(format!(
                    "block offset {} does not follow previous offset {}",
                    block_offset, last.block_offset
                )));
            }
        }
        self.entries.push(IndexEntry::new(first_key, block_offset));
        Ok(())
    }

    /// Serialize all entries and flush the output. A second call after a
    /// successful one does nothing.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        let block_size = self.block_size.ok_or_else(|| {
            FpIndexError::InvalidConfig("block index writer finalized before configure".to_string())
        })?;
        // Taking the stream releases it on every exit path below
        let mut output = self.output.take().ok_or_else(|| {
            FpIndexError::InvalidConfig("block index output released after a failed finalize".to_string())
        })?;

        let entry_count = u32::try_from(self.entries.len()).map_err(|_| {
            FpIndexError::InvalidConfig(format!("too many blocks: {}", self.entries.len()))
        })?;

        let mut data = Vec::with_capacity(INDEX_HEADER_LEN + self.entries.len() * 4);
        data.extend_from_slice(&block_size.to_le_bytes());
        data.extend_from_slice(&entry_count.to_le_bytes());

        let mut prev_key = 0u32;
        for entry in &self.entries {
            encode_vbyte(entry.first_key - prev_key, &mut data);
            encode_vbyte_u64(entry.block_offset, &mut data);
            prev_key = entry.first_key;
        }

        output.write_all(&data)?;
        output.flush()?;
        self.finalized = true;

        debug!(
            blocks = self.entries.len(),
            bytes = data.len(),
            "Block index written"
        );
        Ok(())
    }
}

impl<W: Write> Drop for BlockIndexWriter<W> {
    fn drop(&mut self) {
        // An unfinalized index is not a valid segment; still push out what
        // the stream buffered before releasing it.
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.flush() {
                warn!(error = %e, "Failed to flush unfinalized block index");
            }
        }
    }
}
