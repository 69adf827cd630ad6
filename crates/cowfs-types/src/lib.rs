//! Foundation types for the COW overlay storage substrate.
//!
//! Every other `cowfs` crate depends on `cowfs-types`.
//!
//! # Key Types
//!
//! - [`BlockAddress`] — Content address of a block (hex of its CRC-64 digest)
//! - [`Timestamp`] — Wall-clock `(seconds, nanoseconds)` pair stamped on journal entries
//! - [`ErrorKind`] — Coarse classification shared by every layer's error type
//! - [`SyncMode`] — Durability setting for file writes

pub mod address;
pub mod error;
pub mod sync;
pub mod temporal;

pub use address::{bin2hex, BlockAddress, ADDRESS_LEN, ADDRESS_HEX_LEN};
pub use error::{ErrorKind, TypeError};
pub use sync::SyncMode;
pub use temporal::Timestamp;
