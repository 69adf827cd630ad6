use std::collections::HashMap;
use std::sync::RwLock;

use cowfs_checksum::{address_of, zero_address};
use cowfs_types::BlockAddress;

use crate::attribute::AttributeRecord;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlockRepository, WriteDisposition, WriteOutcome};

/// In-memory, HashMap-based block store.
///
/// Intended for tests of higher layers and for embedding. Same contract as
/// the on-disk store: fixed block size, zero elision, deduplication.
pub struct InMemoryBlockStore {
    block_size: u64,
    zero_pointer: BlockAddress,
    blocks: RwLock<HashMap<BlockAddress, Vec<u8>>>,
    attributes: RwLock<HashMap<BlockAddress, AttributeRecord>>,
}

impl InMemoryBlockStore {
    /// Create a new empty store. `block_size` must be non-zero.
    pub fn new(block_size: u64) -> StoreResult<Self> {
        if block_size == 0 {
            return Err(StoreError::InvalidArgument("block size must be non-zero".into()));
        }
        Ok(Self {
            block_size,
            zero_pointer: zero_address(block_size),
            blocks: RwLock::new(HashMap::new()),
            attributes: RwLock::new(HashMap::new()),
        })
    }

    /// Number of materialized blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no block has been materialized.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Sorted list of materialized block addresses.
    pub fn addresses(&self) -> Vec<BlockAddress> {
        let map = self.blocks.read().expect("lock poisoned");
        let mut ids: Vec<BlockAddress> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl BlockRepository for InMemoryBlockStore {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn zero_pointer(&self) -> BlockAddress {
        self.zero_pointer
    }

    fn write(&self, data: &[u8]) -> StoreResult<WriteOutcome> {
        if data.len() as u64 != self.block_size {
            return Err(StoreError::InvalidBlockSize {
                expected: self.block_size,
                actual: data.len() as u64,
            });
        }
        let address = address_of(data);
        if address == self.zero_pointer {
            return Ok(WriteOutcome::new(address, WriteDisposition::ZeroElided));
        }
        let mut map = self.blocks.write().expect("lock poisoned");
        let disposition = if map.contains_key(&address) {
            WriteDisposition::Deduplicated
        } else {
            map.insert(address, data.to_vec());
            WriteDisposition::Written
        };
        Ok(WriteOutcome::new(address, disposition))
    }

    fn read(&self, address: &BlockAddress) -> StoreResult<Vec<u8>> {
        if *address == self.zero_pointer {
            return Ok(vec![0u8; self.block_size as usize]);
        }
        let map = self.blocks.read().expect("lock poisoned");
        map.get(address)
            .cloned()
            .ok_or(StoreError::NotFound(*address))
    }

    fn contains(&self, address: &BlockAddress) -> StoreResult<bool> {
        if *address == self.zero_pointer {
            return Ok(true);
        }
        Ok(self.blocks.read().expect("lock poisoned").contains_key(address))
    }

    fn set_attribute(&self, address: &BlockAddress, record: &AttributeRecord) -> StoreResult<()> {
        self.attributes
            .write()
            .expect("lock poisoned")
            .insert(*address, *record);
        Ok(())
    }

    fn get_attribute(&self, address: &BlockAddress) -> StoreResult<AttributeRecord> {
        self.attributes
            .read()
            .expect("lock poisoned")
            .get(address)
            .copied()
            .ok_or(StoreError::AttributeNotFound(*address))
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_size", &self.block_size)
            .field("block_count", &self.len())
            .finish()
    }
}
