//! Filesystem-level errors.
//!
//! The kernel adapter maps these onto errno values; the backend taxonomy
//! never crosses the kernel boundary directly.

use std::io;

use thiserror::Error;

/// Error produced by node operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path or name confirmed absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Child resolution or listing attempted on a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Byte read attempted on a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Read offset beyond the end of the value.
    #[error("offset {offset} beyond end of file ({len} bytes)")]
    OffsetOutOfRange { offset: u64, len: u64 },

    /// Static tree construction saw a value that is neither a string nor a
    /// nested mapping.
    #[error("invalid value in static tree: {0}")]
    InvalidValue(String),

    /// The remote store is unreachable; the request cannot proceed.
    #[error("backend inaccessible")]
    BackendUnavailable,
}

impl FsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            FsError::OffsetOutOfRange { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            FsError::InvalidValue(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            FsError::BackendUnavailable => io::Error::other(e.to_string()),
        }
    }
}

/// Node operation result type.
pub type FsResult<T> = Result<T, FsError>;
