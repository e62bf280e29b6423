//! Error types
//!
//! Ring-level failures live in [`crate::ring::RingError`]; this module wraps
//! them together with I/O and multipart framing errors for the session layer.

use std::io;

use crate::ring::RingError;

/// Result type for the session and codec layers
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure
    Io(io::Error),
    /// Ring operation failed
    Ring(RingError),
    /// Malformed multipart stream
    Multipart(MultipartError),
}

/// Multipart framing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// First line of a part was not `--<boundary>`
    BoundaryMismatch {
        /// Boundary the stream was opened with
        expected: String,
        /// Line actually received
        found: String,
    },
    /// Header line exceeds the allowed length
    HeaderTooLong(usize),
    /// Header line is not `Key: Value`
    InvalidHeader(String),
    /// Required header is absent
    MissingHeader(&'static str),
    /// `Content-Length` is not a decimal number
    InvalidContentLength(String),
    /// Stream ended inside a part header
    UnexpectedEof,
}

impl Error {
    /// Check if the error is the non-fatal "no new data" ring condition
    pub fn is_empty(&self) -> bool {
        matches!(self, Error::Ring(err) if err.is_empty())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Ring(e) => write!(f, "Ring error: {}", e),
            Error::Multipart(e) => write!(f, "Multipart error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Ring(e) => Some(e),
            Error::Multipart(e) => Some(e),
        }
    }
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartError::BoundaryMismatch { expected, found } => {
                write!(f, "Expected boundary --{}, got {:?}", expected, found)
            }
            MultipartError::HeaderTooLong(len) => write!(f, "Header line too long: {} bytes", len),
            MultipartError::InvalidHeader(line) => write!(f, "Invalid header line: {:?}", line),
            MultipartError::MissingHeader(name) => write!(f, "Missing header: {}", name),
            MultipartError::InvalidContentLength(value) => {
                write!(f, "Invalid Content-Length: {:?}", value)
            }
            MultipartError::UnexpectedEof => write!(f, "Unexpected end of stream in part header"),
        }
    }
}

impl std::error::Error for MultipartError {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<RingError> for Error {
    fn from(err: RingError) -> Self {
        Error::Ring(err)
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Error::Multipart(err)
    }
}
