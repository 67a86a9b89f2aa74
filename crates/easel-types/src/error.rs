use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid key segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },
}
