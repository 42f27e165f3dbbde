pub mod config;
pub mod error;
pub mod segment;
pub mod store;

pub use config::{SegmentConfig, DEFAULT_BLOCK_SIZE};
pub use error::{FpIndexError, Result};
pub use segment::{
    BlockIndexReader, BlockIndexWriter, MergeStats, Posting, PostingSource, SegmentCursor,
    SegmentDataReader, SegmentDataWriter, SegmentId, SegmentIndex, SegmentInfo, SegmentMerger,
    SegmentStore,
};
pub use store::{Directory, FsDirectory, RamDirectory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
