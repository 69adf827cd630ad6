//! Fixed-size attribute sidecar describing a block.
//!
//! Layout (schema version 1, little-endian, always 4096 bytes):
//!
//! ```text
//! [0..4]    magic "CWAT"
//! [4..8]    schema version (u32)
//! [8]       is_compressed          (0 or 1)
//! [9]       is_frozen              (0 or 1)
//! [10]      newly_allocated_no_cow (0 or 1)
//! [11]      block type
//! [12]      block type backup
//! [13..16]  reserved, zero
//! [16..24]  refresh_count (u64)
//! [24..32]  inode_link_count (u64)
//! [32..]    zero padding
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

/// On-disk size of an attribute record, independent of the block size.
pub const ATTRIBUTE_RECORD_SIZE: usize = 4096;

/// Current attribute schema version.
pub const ATTRIBUTE_SCHEMA_VERSION: u32 = 1;

const MAGIC: [u8; 4] = *b"CWAT";

const OFF_VERSION: usize = 4;
const OFF_COMPRESSED: usize = 8;
const OFF_FROZEN: usize = 9;
const OFF_NO_COW: usize = 10;
const OFF_TYPE: usize = 11;
const OFF_TYPE_BACKUP: usize = 12;
const OFF_RESERVED: usize = 13;
const OFF_REFRESH: usize = 16;
const OFF_LINKS: usize = 24;
const PAYLOAD_END: usize = 32;

/// Role of a block in the overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    /// Filesystem metadata (inodes, directory data).
    #[default]
    Metadata,
    /// Redundant copy kept for copy-on-write.
    CowRedundancy,
}

impl BlockType {
    /// Serialize to the on-disk type byte.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Metadata => 0,
            Self::CowRedundancy => 1,
        }
    }

    /// Parse from the on-disk type byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Metadata),
            1 => Some(Self::CowRedundancy),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::CowRedundancy => write!(f, "cow-redundancy"),
        }
    }
}

/// Reasons an attribute record fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("record is {actual} bytes, expected {}", ATTRIBUTE_RECORD_SIZE)]
    WrongSize { actual: usize },

    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    #[error("flag byte at offset {offset} holds {value}, expected 0 or 1")]
    InvalidFlag { offset: usize, value: u8 },

    #[error("block type bytes {primary} and {backup} are both invalid")]
    InvalidBlockType { primary: u8, backup: u8 },
}

/// Per-block metadata: compression, freeze and allocation state plus counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// The block payload was compressed by the caller before it was written.
    pub is_compressed: bool,
    /// The block belongs to a frozen layer and must not be rewritten in place.
    pub is_frozen: bool,
    /// Freshly allocated; the first write does not need a copy.
    pub newly_allocated_no_cow: bool,
    /// Role of the block.
    pub block_type: BlockType,
    /// Number of times the record has been refreshed by the owning layer.
    pub refresh_count: u64,
    /// Number of inodes referencing the block.
    pub inode_link_count: u64,
}

impl AttributeRecord {
    /// Encode into the fixed on-disk layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; ATTRIBUTE_RECORD_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        buf[OFF_VERSION..OFF_VERSION + 4].copy_from_slice(&ATTRIBUTE_SCHEMA_VERSION.to_le_bytes());
        buf[OFF_COMPRESSED] = u8::from(self.is_compressed);
        buf[OFF_FROZEN] = u8::from(self.is_frozen);
        buf[OFF_NO_COW] = u8::from(self.newly_allocated_no_cow);
        buf[OFF_TYPE] = self.block_type.type_byte();
        buf[OFF_TYPE_BACKUP] = self.block_type.type_byte();
        buf[OFF_REFRESH..OFF_REFRESH + 8].copy_from_slice(&self.refresh_count.to_le_bytes());
        buf[OFF_LINKS..OFF_LINKS + 8].copy_from_slice(&self.inode_link_count.to_le_bytes());
        buf
    }

    /// Decode from the fixed on-disk layout.
    ///
    /// A damaged primary block-type byte is recovered from its backup.
    pub fn decode(buf: &[u8]) -> Result<Self, AttributeError> {
        if buf.len() != ATTRIBUTE_RECORD_SIZE {
            return Err(AttributeError::WrongSize { actual: buf.len() });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[..4]);
        if magic != MAGIC {
            return Err(AttributeError::BadMagic(magic));
        }

        let version = read_u32(buf, OFF_VERSION);
        if version != ATTRIBUTE_SCHEMA_VERSION {
            return Err(AttributeError::UnsupportedVersion(version));
        }

        let primary = buf[OFF_TYPE];
        let backup = buf[OFF_TYPE_BACKUP];
        let block_type = match (BlockType::from_type_byte(primary), BlockType::from_type_byte(backup)) {
            (Some(p), Some(b)) => {
                if p != b {
                    warn!(primary, backup, "attribute block type disagrees with backup; keeping primary");
                }
                p
            }
            (Some(p), None) => p,
            (None, Some(b)) => {
                warn!(primary, backup, "attribute block type recovered from backup");
                b
            }
            (None, None) => return Err(AttributeError::InvalidBlockType { primary, backup }),
        };

        Ok(Self {
            is_compressed: read_flag(buf, OFF_COMPRESSED)?,
            is_frozen: read_flag(buf, OFF_FROZEN)?,
            newly_allocated_no_cow: read_flag(buf, OFF_NO_COW)?,
            block_type,
            refresh_count: read_u64(buf, OFF_REFRESH),
            inode_link_count: read_u64(buf, OFF_LINKS),
        })
    }
}

fn read_flag(buf: &[u8], offset: usize) -> Result<bool, AttributeError> {
    match buf[offset] {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(AttributeError::InvalidFlag { offset, value }),
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

// Reserved bytes and padding are written as zero and ignored on read.
const _: () = assert!(OFF_RESERVED + 3 == OFF_REFRESH && PAYLOAD_END <= ATTRIBUTE_RECORD_SIZE);
