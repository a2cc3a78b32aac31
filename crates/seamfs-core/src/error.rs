//! Error types shared across the crate.

use std::io;
use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem operation errors.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    #[error("parse error: {0}")]
    Parse(#[from] PathParseError),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("read-only filesystem")]
    ReadOnly,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(err.to_string()),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(err.to_string()),
            ErrorKind::IsADirectory => FsError::IsDirectory(err.to_string()),
            ErrorKind::NotADirectory => FsError::NotDirectory(err.to_string()),
            ErrorKind::ReadOnlyFilesystem => FsError::ReadOnly,
            ErrorKind::Unsupported => FsError::Unsupported(err.to_string()),
            _ => FsError::Io(err.to_string()),
        }
    }
}

/// Errors from [`VirtualPath::parse`](crate::path::VirtualPath::parse).
///
/// Surfaced at construction; a constructed path is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("path is empty")]
    Empty,
    #[error("path is not rooted: {0:?}")]
    NotRooted(String),
    #[error("path contains double directory-separators: {0:?}")]
    DoubledSeparators(String),
}
