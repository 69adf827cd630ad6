use cowfs_types::BlockAddress;

use crate::attribute::AttributeRecord;
use crate::error::StoreResult;

/// What a successful `write` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteDisposition {
    /// New content; a block file was created.
    Written,
    /// Identical content was already stored; nothing was touched.
    Deduplicated,
    /// All-zero content; absence of a file represents it.
    ZeroElided,
}

/// Result of a block write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WriteOutcome {
    /// Content address of the written data.
    pub address: BlockAddress,
    /// What happened on disk.
    pub disposition: WriteDisposition,
}

impl WriteOutcome {
    pub fn new(address: BlockAddress, disposition: WriteDisposition) -> Self {
        Self {
            address,
            disposition,
        }
    }
}

/// Content-addressed, deduplicating block repository.
///
/// All implementations must satisfy these invariants:
/// - `write` accepts exactly `block_size()` bytes and nothing else.
/// - The address of a block is derived from its content, never assigned.
/// - Content equal to the zero pointer is never materialized.
/// - Writing content that is already stored is a successful no-op.
/// - Attribute records are mutable in place; callers serialize writers per address.
pub trait BlockRepository: Send + Sync {
    /// Fixed size of every block in bytes.
    fn block_size(&self) -> u64;

    /// Address of the all-zero block.
    fn zero_pointer(&self) -> BlockAddress;

    /// Store one block and return its address.
    fn write(&self, data: &[u8]) -> StoreResult<WriteOutcome>;

    /// Read a block by address. The zero pointer reads as zeros.
    fn read(&self, address: &BlockAddress) -> StoreResult<Vec<u8>>;

    /// Whether `read` would find the block. Always `true` for the zero pointer.
    fn contains(&self, address: &BlockAddress) -> StoreResult<bool>;

    /// Create or replace the attribute record for `address`.
    fn set_attribute(&self, address: &BlockAddress, record: &AttributeRecord) -> StoreResult<()>;

    /// Read the attribute record for `address`.
    fn get_attribute(&self, address: &BlockAddress) -> StoreResult<AttributeRecord>;

    /// Write several blocks. Stops at the first failure.
    fn write_batch(&self, blocks: &[&[u8]]) -> StoreResult<Vec<WriteOutcome>> {
        blocks.iter().map(|data| self.write(data)).collect()
    }
}
