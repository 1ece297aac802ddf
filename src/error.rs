//! Error types for the reftable block engine.

use std::io;
use thiserror::Error;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for reftable operations.
///
/// A block that does not have room for another record is not an error; see
/// [`BlockWriter::add`](crate::block::BlockWriter::add).
#[derive(Debug, Error)]
pub enum Error {
    /// The block source failed to supply bytes.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed framing: unknown block type, truncated restart table,
    /// undecodable key or record, bad file header.
    #[error("Format error: {0}")]
    Format(String),

    /// Deflating or inflating a log block failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a new format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Creates a new compression error.
    pub fn compression(msg: impl Into<String>) -> Self {
        Error::Compression(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns true for framing errors, as opposed to payload or I/O errors.
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}
