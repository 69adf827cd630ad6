use cowfs_types::{BlockAddress, ErrorKind};

use crate::attribute::AttributeError;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The buffer handed to `write` is not exactly one block.
    #[error("data size {actual} does not match block size {expected}")]
    InvalidBlockSize { expected: u64, actual: u64 },

    /// A store was requested with an unusable configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Fewer bytes reached the file than were requested.
    #[error("short write on {address}: wrote {written} of {expected} bytes")]
    ShortWrite {
        address: BlockAddress,
        written: u64,
        expected: u64,
    },

    /// No block file exists for the address.
    #[error("block not found: {0}")]
    NotFound(BlockAddress),

    /// No attribute record exists for the address.
    #[error("attribute record not found: {0}")]
    AttributeNotFound(BlockAddress),

    /// A block file exists but its size or content does not match its name.
    #[error("corrupt block {address}: {reason}")]
    CorruptBlock { address: BlockAddress, reason: String },

    /// An attribute record exists but cannot be decoded.
    #[error("corrupt attribute record {address}: {source}")]
    CorruptAttribute {
        address: BlockAddress,
        #[source]
        source: AttributeError,
    },

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Coarse classification for the calling layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBlockSize { .. } | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ShortWrite { .. } => ErrorKind::ShortWrite,
            Self::NotFound(_) | Self::AttributeNotFound(_) => ErrorKind::NotFound,
            Self::CorruptBlock { .. } | Self::CorruptAttribute { .. } => ErrorKind::Corruption,
            Self::Io(_) => ErrorKind::IoFailure,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let addr = BlockAddress::from_digest(7);
        assert_eq!(
            StoreError::InvalidBlockSize { expected: 4096, actual: 4095 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            StoreError::ShortWrite { address: addr, written: 1, expected: 2 }.kind(),
            ErrorKind::ShortWrite
        );
        assert_eq!(StoreError::AttributeNotFound(addr).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::Io(std::io::Error::other("boom")).kind(),
            ErrorKind::IoFailure
        );
    }

    #[test]
    fn display_names_the_address() {
        let addr = BlockAddress::from_digest(1);
        let msg = StoreError::NotFound(addr).to_string();
        assert!(msg.contains("0100000000000000"));
    }
}
