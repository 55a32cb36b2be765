//! Error types for member collections and dataset aggregation.

use crate::types::MemberId;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid dataset handle: {0:?}")]
    InvalidHandle(String),

    #[error("Invalid state file {path:?}: {reason}")]
    InvalidStateFile { path: PathBuf, reason: String },

    #[error("Corrupt data file {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Table shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Membership store error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Errors surfaced by collection and aggregation operations
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Could not find member {index} (uuid: {uuid}); re-add or remove it.")]
    MemberNotFound { index: usize, uuid: MemberId },

    #[error("Index {index} out of range for collection of {len} members")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No dataset '{0}' found in any member")]
    DatasetNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Member names not unique ({0:?}); index by uuid instead")]
    AmbiguousIndex(Vec<String>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<config::ConfigError> for CollectionError {
    fn from(err: config::ConfigError) -> Self {
        CollectionError::ConfigError(err.to_string())
    }
}
