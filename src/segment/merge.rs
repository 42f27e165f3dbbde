//! K-way merge of sorted segments
//!
//! Every source keeps one active posting in a min-heap keyed by
//! `(key, value, source)`. The smallest posting is emitted unless it equals
//! the one emitted just before it, which collapses postings present in more
//! than one source (or repeated within one).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::cursor::PostingSource;
use super::data_writer::SegmentDataWriter;
use super::types::Posting;
use crate::error::{FpIndexError, Result};

/// Counters reported by a finished merge
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Number of merged sources
    pub sources: usize,
    /// Postings pulled from all sources
    pub postings_read: u64,
    /// Postings written to the destination
    pub postings_written: u64,
    /// Exact duplicates that were collapsed
    pub duplicates_dropped: u64,
}

/// Active posting of one source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HeapEntry {
    posting: Posting,
    source: usize,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .posting
            .cmp(&self.posting)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges any number of posting sources into one segment writer
pub struct SegmentMerger<'a, W: Write, I: Write> {
    writer: &'a mut SegmentDataWriter<W, I>,
    sources: Vec<Box<dyn PostingSource + 'a>>,
}

impl<'a, W: Write, I: Write> SegmentMerger<'a, W, I> {
    pub fn new(writer: &'a mut SegmentDataWriter<W, I>) -> Self {
        Self {
            writer,
            sources: Vec::new(),
        }
    }

    /// Register an input. Sources must yield postings in ascending order.
    pub fn add_source<S: PostingSource + 'a>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Run the merge to completion.
    ///
    /// Does not close the destination writer. Any source error aborts the
    /// merge; what was written so far is not a valid segment and the caller
    /// must discard it.
    pub fn merge(mut self) -> Result<MergeStats> {
        let mut stats = MergeStats {
            sources: self.sources.len(),
            ..Default::default()
        };
        let mut heap = BinaryHeap::with_capacity(self.sources.len());

        for source in 0..self.sources.len() {
            if let Some(posting) = self.pull(source, None)? {
                stats.postings_read += 1;
                heap.push(HeapEntry { posting, source });
            }
        }

        let mut last: Option<Posting> = None;
        while let Some(HeapEntry { posting, source }) = heap.pop() {
            if last == Some(posting) {
                stats.duplicates_dropped += 1;
            } else {
                self.writer.add_item(posting.key, posting.value)?;
                stats.postings_written += 1;
                last = Some(posting);
            }

            if let Some(next) = self.pull(source, Some(posting))? {
                stats.postings_read += 1;
                heap.push(HeapEntry {
                    posting: next,
                    source,
                });
            }
        }

        info!(
            sources = stats.sources,
            read = stats.postings_read,
            written = stats.postings_written,
            duplicates = stats.duplicates_dropped,
            "Segment merge finished"
        );
        Ok(stats)
    }

    /// Advance one source and return its new posting, checking that it
    /// does not go backwards
    fn pull(&mut self, source: usize, previous: Option<Posting>) -> Result<Option<Posting>> {
        let input = &mut self.sources[source];
        if !input.advance()? {
            return Ok(None);
        }
        let posting = match input.current() {
            Some(posting) => posting,
            None => return Ok(None),
        };
        if let Some(previous) = previous {
            if posting < previous {
                return Err(FpIndexError::InvalidSequence(format!(
                    "merge source {} yielded {} after {}",
                    source, posting, previous
                )));
            }
        }
        Ok(Some(posting))
    }
}
