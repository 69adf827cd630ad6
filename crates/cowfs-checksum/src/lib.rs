//! Block identity for the COW overlay storage substrate.
//!
//! A block's identity is `bin2hex(crc64(bytes))`: the reflected CRC-64/ECMA-182
//! digest of its contents, hex-encoded. This crate provides the incremental
//! checksum engine, the one-shot [`hash`] helper, and [`address_of`] which
//! goes straight from bytes to a [`BlockAddress`].

pub mod crc64;

pub use cowfs_types::{bin2hex, BlockAddress};
pub use crc64::{hash, Crc64, Endian, POLYNOMIAL};

/// Content address of `data`.
pub fn address_of(data: &[u8]) -> BlockAddress {
    BlockAddress::from_digest(hash(data))
}

/// Address of an all-zero buffer of `len` bytes.
///
/// Streams fixed-size zero chunks through the engine so that large block
/// sizes do not require a full-size allocation.
pub fn zero_address(len: u64) -> BlockAddress {
    const CHUNK: [u8; 4096] = [0u8; 4096];
    let mut engine = Crc64::new();
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(CHUNK.len() as u64) as usize;
        engine.update(&CHUNK[..n]);
        remaining -= n as u64;
    }
    BlockAddress::from_digest(engine.checksum())
}
