//! Error types for ObjectIO
//!
//! The taxonomy here is the stable, cross-crate contract: every identifier
//! is meant to survive refactors of the modules that raise it, since the
//! transport layer and operator tooling match on these variants rather
//! than on message text.

use crate::types::{BucketNameError, ObjectKeyError};
use thiserror::Error;

/// Common result type for ObjectIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ObjectIO
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("out of memory")]
    NoMem,

    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("version not found: {bucket}/{key}@{version}")]
    VersionNotFound {
        bucket: String,
        key: String,
        version: String,
    },

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("bucket already exists: {0}")]
    BucketExists(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("insufficient chunks for reconstruction: have {available}, need {required}")]
    InsufficientChunks { available: usize, required: usize },

    #[error("quorum unavailable: have {available}, need {required}")]
    QuorumUnavailable { available: usize, required: usize },

    #[error("no topology consensus among {disk_count} disks")]
    NoTopologyConsensus { disk_count: usize },

    #[error("operation timed out")]
    Timeout,

    #[error("initialization failed: {0}")]
    Init(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid bucket name: {0}")]
    InvalidBucketName(#[from] BucketNameError),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(#[from] ObjectKeyError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    #[must_use]
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Errors that a retrying caller (the migration worker, not the
    /// request path) should back off and reattempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Io(_) | Self::QuorumUnavailable { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::VersionNotFound { .. } | Self::BucketNotFound(_)
        )
    }
}
