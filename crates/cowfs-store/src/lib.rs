//! Content-addressed block storage for the COW overlay.
//!
//! Every block has a fixed size and is named by the hex of its CRC-64 digest,
//! so identical content is stored once no matter how many owners write it.
//! The all-zero block is never stored: a missing file is how the overlay
//! represents an unallocated region.
//!
//! # Backends
//!
//! All backends implement the [`BlockRepository`] trait:
//!
//! - [`BlockStore`] -- one file per block under a data directory, plus
//!   fixed-size `<address>.attr` sidecars
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Block files are created with a temp file and an exclusive link, so a
//!    crash never leaves a partially written block under its final name.
//! 3. Concurrent block writes are safe; concurrent attribute writes to one
//!    address are not and must be serialized by the caller.
//! 4. The store never interprets block contents, including compression.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod attribute;
pub mod disk;
pub mod error;
pub mod memory;
pub mod traits;

pub use attribute::{
    AttributeError, AttributeRecord, BlockType, ATTRIBUTE_RECORD_SIZE, ATTRIBUTE_SCHEMA_VERSION,
};
pub use disk::{BlockStore, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlockStore;
pub use traits::{BlockRepository, WriteDisposition, WriteOutcome};
