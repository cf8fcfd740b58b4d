//! Persistence error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value could not be decoded
    #[error("Corrupt value for key {key}: {message}")]
    Corrupt { key: String, message: String },

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key contains characters that cannot name a file
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
