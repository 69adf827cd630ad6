use std::io;
use std::path::PathBuf;

use cowfs_types::ErrorKind;

/// Errors produced by the journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// More parameters were supplied than a record can hold.
    #[error("too many parameters: {count} (max {max})")]
    TooManyParams { count: usize, max: usize },

    /// The log file (or its replacement) could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The truncated log could not be moved into place.
    #[error("failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error while reading or writing records.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl JournalError {
    /// Coarse classification for the calling layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooManyParams { .. } => ErrorKind::InvalidArgument,
            Self::Open { .. } | Self::Replace { .. } | Self::Io(_) => ErrorKind::IoFailure,
        }
    }
}

/// Convenience alias used throughout the journal crate.
pub type JournalResult<T> = std::result::Result<T, JournalError>;
