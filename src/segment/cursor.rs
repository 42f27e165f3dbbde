//! Forward, seekable cursor over one segment
//!
//! Combines a loaded `SegmentIndex` with a `SegmentDataReader`. While
//! decoding, every block start is checked against the index: it must begin
//! at the recorded offset with the recorded first key, and the data must end
//! inside the last indexed block.

use std::io::{Read, Seek};
use std::sync::Arc;

use super::data_reader::SegmentDataReader;
use super::index::SegmentIndex;
use super::types::Posting;
use crate::error::{FpIndexError, Result};

/// Anything that yields postings in ascending `(key, value)` order
pub trait PostingSource {
    /// Move to the next posting; `false` once exhausted
    fn advance(&mut self) -> Result<bool>;

    /// Posting the source is positioned on, if any
    fn current(&self) -> Option<Posting>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    Unstarted,
    Active,
    Exhausted,
}

/// Cursor over the postings of one segment
pub struct SegmentCursor<R: Read + Seek> {
    index: Arc<SegmentIndex>,
    reader: SegmentDataReader<R>,
    state: CursorState,
    current: Option<Posting>,
    /// Posting decoded by `seek`, handed out by the following `next`
    pending: Option<Posting>,
    /// Index entry expected for the next block start
    next_block: usize,
    blocks_visited: u64,
}

impl<R: Read + Seek> SegmentCursor<R> {
    pub fn new(index: Arc<SegmentIndex>, reader: SegmentDataReader<R>) -> Result<Self> {
        if index.block_size() != reader.block_size() {
            return Err(FpIndexError::InvalidConfig(format!(
                "data reader block size {} does not match index block size {}",
                reader.block_size(),
                index.block_size()
            )));
        }
        Ok(Self {
            index,
            reader,
            state: CursorState::Unstarted,
            current: None,
            pending: None,
            next_block: 0,
            blocks_visited: 0,
        })
    }

    pub fn index(&self) -> &Arc<SegmentIndex> {
        &self.index
    }

    /// Advance to the next posting. Returns `false` once the segment is
    /// exhausted; further calls keep returning `false`.
    pub fn next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Exhausted => return Ok(false),
            CursorState::Unstarted => self.start()?,
            CursorState::Active => {}
        }

        if let Some(posting) = self.pending.take() {
            self.current = Some(posting);
            return Ok(true);
        }

        match self.decode() {
            Ok(Some(posting)) => {
                self.current = Some(posting);
                Ok(true)
            }
            Ok(None) => {
                self.exhaust();
                Ok(false)
            }
            Err(e) => {
                self.exhaust();
                Err(e)
            }
        }
    }

    /// Position the cursor so that the following `next` yields the first
    /// posting with a key `>= key`.
    ///
    /// Jumps straight to the candidate block through the index, then decodes
    /// forward. Returns `false` if no such posting exists, in which case the
    /// cursor is exhausted.
    pub fn seek(&mut self, key: u32) -> Result<bool> {
        self.pending = None;
        self.current = None;

        let block = match self.index.find_block(key) {
            Some(block) => block,
            None => {
                self.exhaust();
                return Ok(false);
            }
        };

        self.state = CursorState::Active;
        self.jump_to(block)?;

        loop {
            match self.decode() {
                Ok(Some(posting)) if posting.key >= key => {
                    self.pending = Some(posting);
                    return Ok(true);
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    self.exhaust();
                    return Ok(false);
                }
                Err(e) => {
                    self.exhaust();
                    return Err(e);
                }
            }
        }
    }

    /// Current posting, or `None` before the first `next` and after exhaustion
    pub fn current(&self) -> Option<Posting> {
        self.current
    }

    /// Key of the current posting.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not positioned on a posting.
    pub fn key(&self) -> u32 {
        self.positioned().key
    }

    /// Value of the current posting.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not positioned on a posting.
    pub fn value(&self) -> u32 {
        self.positioned().value
    }

    /// Number of blocks whose first posting this cursor has decoded
    pub fn blocks_visited(&self) -> u64 {
        self.blocks_visited
    }

    /// Consume the cursor as an iterator of postings
    pub fn postings(self) -> Postings<R> {
        Postings {
            cursor: self,
            failed: false,
        }
    }

    fn positioned(&self) -> Posting {
        match self.current {
            Some(posting) => posting,
            None => panic!("segment cursor accessed while not positioned on a posting"),
        }
    }

    fn start(&mut self) -> Result<()> {
        self.state = CursorState::Active;
        if !self.index.is_empty() {
            self.jump_to(0)?;
        }
        Ok(())
    }

    fn exhaust(&mut self) {
        self.state = CursorState::Exhausted;
        self.current = None;
        self.pending = None;
    }

    fn jump_to(&mut self, block: usize) -> Result<()> {
        let offset = match self.index.entry(block) {
            Some(entry) => entry.block_offset,
            None => {
                return Err(FpIndexError::corruption(format!(
                    "block {} is not in the index",
                    block
                )))
            }
        };
        self.reader.seek_to_block(offset)?;
        self.next_block = block;
        Ok(())
    }

    fn decode(&mut self) -> Result<Option<Posting>> {
        match self.reader.next()? {
            Some(posting) => {
                if self.reader.postings_in_block() == 1 {
                    self.enter_block(posting)?;
                }
                Ok(Some(posting))
            }
            None if self.next_block == self.index.len() => Ok(None),
            None => Err(FpIndexError::corruption(format!(
                "data ends after {} of {} blocks",
                self.next_block,
                self.index.len()
            ))),
        }
    }

    fn enter_block(&mut self, first: Posting) -> Result<()> {
        let block = self.next_block;
        let entry = self.index.entry(block).ok_or_else(|| {
            FpIndexError::corruption(format!(
                "data continues past the last indexed block at offset {}",
                self.reader.block_offset()
            ))
        })?;
        if entry.block_offset != self.reader.block_offset() {
            return Err(FpIndexError::corruption(format!(
                "block {} starts at offset {}, index says {}",
                block,
                self.reader.block_offset(),
                entry.block_offset
            )));
        }
        if entry.first_key != first.key {
            return Err(FpIndexError::corruption(format!(
                "block {} starts with key {}, index says {}",
                block, first.key, entry.first_key
            )));
        }
        self.next_block = block + 1;
        self.blocks_visited += 1;
        Ok(())
    }
}

impl<R: Read + Seek> PostingSource for SegmentCursor<R> {
    fn advance(&mut self) -> Result<bool> {
        self.next()
    }

    fn current(&self) -> Option<Posting> {
        self.current
    }
}

/// Iterator adapter over a segment cursor. Stops after the first error.
pub struct Postings<R: Read + Seek> {
    cursor: SegmentCursor<R>,
    failed: bool,
}

impl<R: Read + Seek> Iterator for Postings<R> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.cursor.next() {
            Ok(true) => self.cursor.current.map(Ok),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// In-memory posting source over an already sorted sequence
pub struct VecSource {
    postings: std::vec::IntoIter<Posting>,
    current: Option<Posting>,
}

impl VecSource {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            postings: postings.into_iter(),
            current: None,
        }
    }
}

impl PostingSource for VecSource {
    fn advance(&mut self) -> Result<bool> {
        self.current = self.postings.next();
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<Posting> {
        self.current
    }
}
