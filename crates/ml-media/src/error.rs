//! Media service errors

use thiserror::Error;

use crate::storage::StorageError;
use crate::thumbnail::ThumbnailError;

/// Service errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unknown disk: {0}")]
    UnknownDisk(String),
    #[error("Invalid media name: {0}")]
    InvalidName(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),
    #[error("Metadata store error: {0}")]
    Store(String),
    #[error("Thumbnail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MediaError {
    /// Wrap a metadata store failure
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
