//! Segment data writer
//!
//! Postings are grouped into blocks of `block_size`. Within a block each
//! posting is `{ key_delta: vbyte, value: vbyte }`; the first posting of a
//! block stores its key absolute, so a block decodes on its own given its
//! offset. Every block start is reported to the block index writer.

use std::io::Write;

use tracing::{debug, info, warn};

use super::codec::encode_vbyte;
use super::index_writer::BlockIndexWriter;
use crate::error::{FpIndexError, Result};

/// Writes one new segment: data file plus its block index
pub struct SegmentDataWriter<W: Write, I: Write> {
    output: Option<W>,
    index_writer: BlockIndexWriter<I>,
    block_size: u32,
    /// Encoded postings of the block being built
    block: Vec<u8>,
    block_first_key: u32,
    block_len: u32,
    last_key: Option<u32>,
    /// Bytes written to `output` so far
    position: u64,
    postings: u64,
    blocks: u64,
    closed: bool,
    /// Set by the first error; the segment can then only be discarded
    failed: bool,
}

impl<W: Write, I: Write> SegmentDataWriter<W, I> {
    /// Create a writer; configures `index_writer` with `block_size`
    pub fn new(output: W, mut index_writer: BlockIndexWriter<I>, block_size: u32) -> Result<Self> {
        index_writer.configure(block_size)?;
        Ok(Self {
            output: Some(output),
            index_writer,
            block_size,
            block: Vec::new(),
            block_first_key: 0,
            block_len: 0,
            last_key: None,
            position: 0,
            postings: 0,
            blocks: 0,
            closed: false,
            failed: false,
        })
    }

    /// Append one posting. Keys must not decrease; equal keys are fine.
    /// Duplicate `(key, value)` pairs are not filtered here.
    ///
    /// Any error leaves the writer failed: later `add_item` and `close` calls
    /// are refused and the segment must be discarded.
    pub fn add_item(&mut self, key: u32, value: u32) -> Result<()> {
        self.check_usable()?;
        if self.closed {
            return Err(FpIndexError::InvalidConfig(
                "segment data writer already closed".to_string(),
            ));
        }
        let result = self.append(key, value);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn append(&mut self, key: u32, value: u32) -> Result<()> {
        match self.last_key {
            Some(last) if key < last => {
                return Err(FpIndexError::InvalidSequence(format!(
                    "key {} added after key {}",
                    key, last
                )));
            }
            Some(last) if self.block_len > 0 => encode_vbyte(key - last, &mut self.block),
            _ => {
                self.block_first_key = key;
                encode_vbyte(key, &mut self.block);
            }
        }
        encode_vbyte(value, &mut self.block);

        self.block_len += 1;
        self.last_key = Some(key);
        self.postings += 1;

        if self.block_len == self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn postings_written(&self) -> u64 {
        self.postings
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks
    }

    /// Data bytes handed to the output stream so far
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether an earlier call failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Flush the final partial block, finalize the block index and release
    /// both streams.
    ///
    /// Runs at most once: after a successful close, later calls and the
    /// implicit close on drop do nothing. After any failure, including a
    /// failed close, every later call returns an error and the segment files
    /// must be discarded.
    pub fn close(&mut self) -> Result<()> {
        self.check_usable()?;
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.finish();
        if result.is_err() {
            self.failed = true;
        }
        // Release the data stream on success and failure alike
        self.output = None;
        result
    }

    /// Give up on the segment without finalizing it. The caller is expected
    /// to delete the files.
    pub fn discard(mut self) {
        self.closed = true;
        self.output = None;
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(FpIndexError::InvalidConfig(
                "segment data writer failed; discard it".to_string(),
            ));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_block()?;
        self.output_mut()?.flush()?;
        self.index_writer.finalize()?;
        info!(
            postings = self.postings,
            blocks = self.blocks,
            bytes = self.position,
            "Segment closed"
        );
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_len == 0 {
            return Ok(());
        }
        self.index_writer
            .record_block_start(self.block_first_key, self.position)?;

        let output = self
            .output
            .as_mut()
            .ok_or_else(|| FpIndexError::InvalidConfig("segment data writer released".to_string()))?;
        output.write_all(&self.block)?;

        debug!(
            first_key = self.block_first_key,
            offset = self.position,
            postings = self.block_len,
            "Block flushed"
        );

        self.position += self.block.len() as u64;
        self.blocks += 1;
        self.block.clear();
        self.block_len = 0;
        Ok(())
    }

    fn output_mut(&mut self) -> Result<&mut W> {
        self.output
            .as_mut()
            .ok_or_else(|| FpIndexError::InvalidConfig("segment data writer released".to_string()))
    }
}

impl<W: Write, I: Write> Drop for SegmentDataWriter<W, I> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.failed {
            warn!("Dropping failed segment data writer without finalizing");
            return;
        }
        match self.close() {
            Ok(()) => debug!("Segment data writer closed on drop"),
            Err(e) => warn!(error = %e, "Implicit close of segment data writer failed"),
        }
    }
}
