use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SegmentConfig;
use crate::error::{FpIndexError, Result};
use crate::segment::cursor::SegmentCursor;
use crate::segment::data_reader::SegmentDataReader;
use crate::segment::data_writer::SegmentDataWriter;
use crate::segment::index::SegmentIndex;
use crate::segment::index_writer::BlockIndexWriter;
use crate::segment::merge::{MergeStats, SegmentMerger};
use crate::segment::types::{Posting, SegmentId};
use crate::store::{Directory, InputStream, OutputStream};

/// Writer for a segment stored in a `Directory`
pub type StoreSegmentWriter = SegmentDataWriter<Box<dyn OutputStream>, Box<dyn OutputStream>>;

/// Cursor over a segment stored in a `Directory`
pub type StoreSegmentCursor = SegmentCursor<Box<dyn InputStream>>;

/// Physical description of a stored segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: SegmentId,
    pub block_size: u32,
    pub blocks: usize,
    pub index_bytes: u64,
    pub data_bytes: u64,
}

/// Creates, opens and compacts segments kept as file pairs in a directory.
pub struct SegmentStore {
    directory: Arc<dyn Directory>,
    config: SegmentConfig,
}

impl SegmentStore {
    pub fn new(directory: Arc<dyn Directory>, config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { directory, config })
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Start a new segment. Postings go in through `add_item`; the segment
    /// becomes readable once the writer is closed.
    pub fn create_segment(&self, id: SegmentId) -> Result<StoreSegmentWriter> {
        let index_output = self.directory.create_file(&id.index_file_name())?;
        let data_output = match self.directory.create_file(&id.data_file_name()) {
            Ok(output) => output,
            Err(e) => {
                // Release the index stream first so nothing republishes it
                drop(index_output);
                self.discard_files(id);
                return Err(e.into());
            }
        };
        SegmentDataWriter::new(
            data_output,
            BlockIndexWriter::new(index_output),
            self.config.block_size,
        )
    }

    /// Write a complete segment from postings sorted by key
    pub fn write_segment<I>(&self, id: SegmentId, postings: I) -> Result<SegmentInfo>
    where
        I: IntoIterator<Item = Posting>,
    {
        let mut writer = self.create_segment(id)?;
        let written = postings
            .into_iter()
            .try_for_each(|p| writer.add_item(p.key, p.value))
            .and_then(|()| writer.close());

        if let Err(e) = written {
            writer.discard();
            self.discard_files(id);
            return Err(e);
        }
        self.segment_info(id)
    }

    /// Load the block index of a segment
    pub fn load_index(&self, id: SegmentId) -> Result<Arc<SegmentIndex>> {
        if !self.segment_exists(id) {
            return Err(FpIndexError::SegmentNotFound(id));
        }
        let input = self.directory.open_file(&id.index_file_name())?;
        Ok(Arc::new(SegmentIndex::load(input)?))
    }

    /// Open a cursor over a segment
    pub fn open_segment(&self, id: SegmentId) -> Result<StoreSegmentCursor> {
        let index = self.load_index(id)?;
        self.open_with_index(id, index)
    }

    /// Open another cursor over a segment whose index is already loaded
    pub fn open_with_index(
        &self,
        id: SegmentId,
        index: Arc<SegmentIndex>,
    ) -> Result<StoreSegmentCursor> {
        let input = self.directory.open_file(&id.data_file_name())?;
        let reader = SegmentDataReader::new(input, index.block_size());
        SegmentCursor::new(index, reader)
    }

    pub fn segment_info(&self, id: SegmentId) -> Result<SegmentInfo> {
        let index = self.load_index(id)?;
        Ok(SegmentInfo {
            id,
            block_size: index.block_size(),
            blocks: index.len(),
            index_bytes: self.directory.file_len(&id.index_file_name())?,
            data_bytes: self.directory.file_len(&id.data_file_name())?,
        })
    }

    /// Merge `sources` into a new segment `into`.
    ///
    /// Sources are only read. If anything fails, the destination files are
    /// deleted and the error is returned; the caller may delete the sources
    /// once this succeeds.
    pub fn compact(&self, sources: &[SegmentId], into: SegmentId) -> Result<MergeStats> {
        if sources.contains(&into) {
            return Err(FpIndexError::InvalidConfig(format!(
                "compaction target {} is also a source",
                into
            )));
        }
        if self.segment_exists(into) {
            return Err(FpIndexError::InvalidConfig(format!(
                "compaction target {} already exists",
                into
            )));
        }

        // Open every source up front so a missing one fails before any write
        let cursors = sources
            .iter()
            .map(|&id| self.open_segment(id))
            .collect::<Result<Vec<_>>>()?;

        let mut writer = self.create_segment(into)?;
        let merged = {
            let mut merger = SegmentMerger::new(&mut writer);
            for cursor in cursors {
                merger.add_source(cursor);
            }
            merger.merge()
        };

        let stats = match merged.and_then(|stats| writer.close().map(|()| stats)) {
            Ok(stats) => stats,
            Err(e) => {
                writer.discard();
                self.discard_files(into);
                return Err(e);
            }
        };

        info!(
            sources = ?sources,
            into = %into,
            postings = stats.postings_written,
            "Segments compacted"
        );
        Ok(stats)
    }

    /// Remove both files of a segment
    pub fn delete_segment(&self, id: SegmentId) -> Result<()> {
        if !self.segment_exists(id) {
            return Err(FpIndexError::SegmentNotFound(id));
        }
        self.directory.delete_file(&id.index_file_name())?;
        self.directory.delete_file(&id.data_file_name())?;
        Ok(())
    }

    /// Whether both files of a segment are present
    pub fn segment_exists(&self, id: SegmentId) -> bool {
        self.directory.file_exists(&id.index_file_name())
            && self.directory.file_exists(&id.data_file_name())
    }

    /// Ids of all complete segments, ascending
    pub fn list_segments(&self) -> Result<Vec<SegmentId>> {
        let mut ids: Vec<SegmentId> = self
            .directory
            .list_files()?
            .iter()
            .filter_map(|name| name.strip_prefix("segment_")?.strip_suffix(".fii"))
            .filter_map(|id| id.parse::<u64>().ok())
            .map(SegmentId::new)
            .filter(|&id| self.segment_exists(id))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Best-effort removal of an invalid segment's files
    fn discard_files(&self, id: SegmentId) {
        for name in [id.index_file_name(), id.data_file_name()] {
            if self.directory.file_exists(&name) {
                if let Err(e) = self.directory.delete_file(&name) {
                    warn!(file = %name, error = %e, "Failed to discard segment file");
                }
            }
        }
        warn!(segment = %id, "Discarded incomplete segment");
    }
}
