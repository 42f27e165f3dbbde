use thiserror::Error;

use crate::segment::SegmentId;

/// Main error type for segment storage operations
#[derive(Error, Debug)]
pub enum FpIndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("Corrupt segment: {0}")]
    Corruption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),
}

/// Result type alias for segment storage operations
pub type Result<T> = std::result::Result<T, FpIndexError>;

impl FpIndexError {
    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        FpIndexError::Corruption(msg.into())
    }

    /// Check if the decoded data did not match the on-disk format
    pub fn is_corruption(&self) -> bool {
        matches!(self, FpIndexError::Corruption(_))
    }

    /// Check if this error is a caller bug rather than an environmental failure.
    /// Retrying such an operation never helps.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            FpIndexError::InvalidSequence(_) | FpIndexError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FpIndexError::SegmentNotFound(SegmentId::new(42));
        assert_eq!(err.to_string(), "Segment not found: segment_42");

        let err = FpIndexError::corruption("truncated block");
        assert_eq!(err.to_string(), "Corrupt segment: truncated block");
    }

    #[test]
    fn test_error_classification() {
        assert!(FpIndexError::InvalidSequence("k".into()).is_contract_violation());
        assert!(FpIndexError::InvalidConfig("0".into()).is_contract_violation());
        assert!(!FpIndexError::corruption("x").is_contract_violation());
        assert!(FpIndexError::corruption("x").is_corruption());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FpIndexError = io.into();
        assert!(!err.is_corruption());
        assert!(!err.is_contract_violation());
    }
}
