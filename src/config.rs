use serde::{Deserialize, Serialize};

use crate::error::{FpIndexError, Result};

/// Default number of postings per data block
pub const DEFAULT_BLOCK_SIZE: u32 = 128;

/// Per-segment configuration, fixed when the segment is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Number of postings per block. The final block of a segment may hold fewer.
    pub block_size: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl SegmentConfig {
    pub fn new(block_size: u32) -> Result<Self> {
        let config = Self { block_size };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style block size override
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_block_size(self.block_size)
    }
}

pub(crate) fn validate_block_size(block_size: u32) -> Result<()> {
    if block_size == 0 {
        return Err(FpIndexError::InvalidConfig(
            "block size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
