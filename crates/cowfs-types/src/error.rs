use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Coarse classification of a failure, shared by the store and the journal.
///
/// Callers at the process boundary map these to diagnostics and exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A caller-supplied argument was rejected (wrong block size, too many params).
    InvalidArgument,
    /// The filesystem refused an open, read, write or rename.
    IoFailure,
    /// Fewer bytes were persisted than requested.
    ShortWrite,
    /// The addressed file does not exist.
    NotFound,
    /// A file exists at an expected address but its contents are unusable.
    Corruption,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::IoFailure => write!(f, "I/O failure"),
            Self::ShortWrite => write!(f, "short write"),
            Self::NotFound => write!(f, "not found"),
            Self::Corruption => write!(f, "corruption"),
        }
    }
}

impl From<&TypeError> for ErrorKind {
    fn from(_: &TypeError) -> Self {
        Self::InvalidArgument
    }
}
