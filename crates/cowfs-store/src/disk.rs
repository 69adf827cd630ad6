use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cowfs_checksum::{address_of, zero_address};
use cowfs_types::{BlockAddress, SyncMode, ADDRESS_HEX_LEN};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::attribute::{AttributeRecord, ATTRIBUTE_RECORD_SIZE};
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlockRepository, WriteDisposition, WriteOutcome};

/// Configuration for the on-disk block store.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Sync strategy for block and attribute files.
    pub sync_mode: SyncMode,
}

/// On-disk block store: one file per block under `data_dir`.
///
/// ```text
/// <data_dir>/<16 hex chars>        exactly block_size bytes
/// <data_dir>/<16 hex chars>.attr   exactly 4096 bytes
/// ```
///
/// File handles never outlive a single call.
pub struct BlockStore {
    data_dir: PathBuf,
    block_size: u64,
    zero_pointer: BlockAddress,
    config: StoreConfig,
}

impl BlockStore {
    /// Open (or create) a store rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>, block_size: u64) -> StoreResult<Self> {
        Self::open_with_config(data_dir, block_size, StoreConfig::default())
    }

    /// Open (or create) a store with explicit configuration.
    pub fn open_with_config(
        data_dir: impl AsRef<Path>,
        block_size: u64,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        if block_size == 0 {
            return Err(StoreError::InvalidArgument("block size must be non-zero".into()));
        }
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let zero_pointer = zero_address(block_size);
        debug!(dir = %data_dir.display(), block_size, %zero_pointer, "block store opened");

        Ok(Self {
            data_dir,
            block_size,
            zero_pointer,
            config,
        })
    }

    /// Storage root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the block file for `address`.
    pub fn block_path(&self, address: &BlockAddress) -> PathBuf {
        self.data_dir.join(address.to_hex())
    }

    /// Path of the attribute sidecar for `address`.
    pub fn attribute_path(&self, address: &BlockAddress) -> PathBuf {
        self.data_dir.join(address.attribute_file_name())
    }

    /// Recompute the checksum of a stored block and compare it with its name.
    pub fn verify(&self, address: &BlockAddress) -> StoreResult<()> {
        let data = self.read(address)?;
        let computed = address_of(&data);
        if computed != *address {
            return Err(StoreError::CorruptBlock {
                address: *address,
                reason: format!("content hashes to {computed}"),
            });
        }
        Ok(())
    }

    /// Every stored block address, sorted.
    pub fn addresses(&self) -> StoreResult<Vec<BlockAddress>> {
        self.scan(|name| (name.len() == ADDRESS_HEX_LEN).then_some(name))
    }

    /// Every address that has an attribute sidecar, sorted.
    pub fn attribute_addresses(&self) -> StoreResult<Vec<BlockAddress>> {
        self.scan(|name| name.strip_suffix(".attr"))
    }

    fn scan(&self, select: impl Fn(&str) -> Option<&str>) -> StoreResult<Vec<BlockAddress>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(address) = select(name).and_then(|hex| BlockAddress::from_hex(hex).ok()) {
                out.push(address);
            }
        }
        out.sort();
        Ok(out)
    }

    fn temp_file(&self) -> StoreResult<NamedTempFile> {
        Ok(tempfile::Builder::new()
            .prefix(".cowfs-")
            .suffix(".tmp")
            .tempfile_in(&self.data_dir)?)
    }

    fn finish_temp(&self, tmp: &NamedTempFile) -> io::Result<()> {
        if self.config.sync_mode.syncs() {
            tmp.as_file().sync_all()?;
        }
        Ok(())
    }

    /// Make a completed rename durable by syncing the data directory.
    fn sync_data_dir(&self) -> io::Result<()> {
        if self.config.sync_mode.syncs() {
            File::open(&self.data_dir)?.sync_all()?;
        }
        Ok(())
    }
}

/// Write as much of `data` as the file accepts and report the byte count.
fn write_counted(file: &mut File, data: &[u8]) -> io::Result<u64> {
    let mut written = 0usize;
    while written < data.len() {
        match file.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written as u64)
}

impl BlockRepository for BlockStore {
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
            debug!(%address, "zero block elided");
            return Ok(WriteOutcome::new(address, WriteDisposition::ZeroElided));
        }

        let path = self.block_path(&address);
        if path.try_exists()? {
            debug!(%address, "block deduplicated");
            return Ok(WriteOutcome::new(address, WriteDisposition::Deduplicated));
        }

        let mut tmp = self.temp_file()?;
        let written = write_counted(tmp.as_file_mut(), data)?;
        let on_disk = tmp.as_file().metadata()?.len();
        if written != self.block_size || on_disk != self.block_size {
            return Err(StoreError::ShortWrite {
                address,
                written: written.min(on_disk),
                expected: self.block_size,
            });
        }
        self.finish_temp(&tmp)?;

        // Identical content may have landed since the existence check.
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                self.sync_data_dir()?;
                debug!(%address, bytes = self.block_size, "block written");
                Ok(WriteOutcome::new(address, WriteDisposition::Written))
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(%address, "block deduplicated after race");
                Ok(WriteOutcome::new(address, WriteDisposition::Deduplicated))
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    fn read(&self, address: &BlockAddress) -> StoreResult<Vec<u8>> {
        if *address == self.zero_pointer {
            return Ok(vec![0u8; self.block_size as usize]);
        }
        let data = match fs::read(self.block_path(address)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*address));
            }
            Err(e) => return Err(e.into()),
        };
        if data.len() as u64 != self.block_size {
            return Err(StoreError::CorruptBlock {
                address: *address,
                reason: format!("file is {} bytes, block size is {}", data.len(), self.block_size),
            });
        }
        Ok(data)
    }

    fn contains(&self, address: &BlockAddress) -> StoreResult<bool> {
        if *address == self.zero_pointer {
            return Ok(true);
        }
        Ok(self.block_path(address).try_exists()?)
    }

    fn set_attribute(&self, address: &BlockAddress, record: &AttributeRecord) -> StoreResult<()> {
        let buf = record.encode();
        let mut tmp = self.temp_file()?;
        let written = write_counted(tmp.as_file_mut(), &buf)?;
        if written != ATTRIBUTE_RECORD_SIZE as u64 {
            return Err(StoreError::ShortWrite {
                address: *address,
                written,
                expected: ATTRIBUTE_RECORD_SIZE as u64,
            });
        }
        self.finish_temp(&tmp)?;
        tmp.persist(self.attribute_path(address))
            .map_err(|e| StoreError::Io(e.error))?;
        self.sync_data_dir()?;

        debug!(%address, ?record, "attribute record written");
        Ok(())
    }

    fn get_attribute(&self, address: &BlockAddress) -> StoreResult<AttributeRecord> {
        let buf = match fs::read(self.attribute_path(address)) {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::AttributeNotFound(*address));
            }
            Err(e) => return Err(e.into()),
        };
        AttributeRecord::decode(&buf).map_err(|source| StoreError::CorruptAttribute {
            address: *address,
            source,
        })
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("data_dir", &self.data_dir)
            .field("block_size", &self.block_size)
            .field("zero_pointer", &self.zero_pointer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeError, BlockType};
    use cowfs_checksum::hash;
    use cowfs_types::{bin2hex, ErrorKind};

    fn open(block_size: u64) -> (tempfile::TempDir, BlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("data"), block_size).unwrap();
        (dir, store)
    }

    fn file_count(store: &BlockStore) -> usize {
        fs::read_dir(store.data_dir()).unwrap().count()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data");
        let store = BlockStore::open(&path, 512).unwrap();
        assert!(path.is_dir());
        assert_eq!(store.block_size(), 512);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlockStore::open(dir.path(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn zero_pointer_is_hash_of_zero_buffer() {
        for n in [1u64, 4096, 65536] {
            let (_dir, store) = open(n);
            let expected = bin2hex(&hash(&vec![0u8; n as usize]).to_be_bytes());
            assert_eq!(store.zero_pointer().to_hex(), expected, "block size {n}");
        }
    }

    // -----------------------------------------------------------------------
    // Zero elision
    // -----------------------------------------------------------------------

    #[test]
    fn zero_block_never_touches_disk() {
        for n in [1u64, 4096, 65536] {
            let (_dir, store) = open(n);
            let zeros = vec![0u8; n as usize];
            for _ in 0..3 {
                let outcome = store.write(&zeros).unwrap();
                assert_eq!(outcome.disposition, WriteDisposition::ZeroElided);
                assert_eq!(outcome.address, store.zero_pointer());
            }
            assert_eq!(file_count(&store), 0);
        }
    }

    #[test]
    fn zero_pointer_reads_as_zeros() {
        let (_dir, store) = open(64);
        assert!(store.contains(&store.zero_pointer()).unwrap());
        assert_eq!(store.read(&store.zero_pointer()).unwrap(), vec![0u8; 64]);
    }

    // -----------------------------------------------------------------------
    // Deduplication
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_write_dedup_and_elide() {
        let (_dir, store) = open(4096);
        let ones = vec![0x01u8; 4096];

        let first = store.write(&ones).unwrap();
        assert_eq!(first.disposition, WriteDisposition::Written);
        assert_eq!(first.address.to_hex(), bin2hex(&hash(&ones).to_be_bytes()));
        assert!(store.block_path(&first.address).is_file());
        assert_eq!(file_count(&store), 1);

        let second = store.write(&ones).unwrap();
        assert_eq!(second.disposition, WriteDisposition::Deduplicated);
        assert_eq!(second.address, first.address);
        assert_eq!(file_count(&store), 1);

        store.write(&vec![0u8; 4096]).unwrap();
        assert_eq!(file_count(&store), 1);
    }

    #[test]
    fn block_file_is_named_by_numeric_digest() {
        let (_dir, store) = open(9);
        let outcome = store.write(b"123456789").unwrap();
        assert_eq!(outcome.disposition, WriteDisposition::Written);
        assert!(store.data_dir().join("995dc9bbdf1939fa").is_file());
        assert_eq!(store.addresses().unwrap(), vec![outcome.address]);
        store.verify(&outcome.address).unwrap();
    }

    #[test]
    fn different_content_gets_different_files() {
        let (_dir, store) = open(128);
        let a = vec![0x11u8; 128];
        let mut b = a.clone();
        b[127] = 0x12;
        let ida = store.write(&a).unwrap().address;
        let idb = store.write(&b).unwrap().address;
        assert_ne!(ida, idb);
        assert_eq!(ida.to_hex().len(), 16);
        assert_eq!(idb.to_hex().len(), 16);
        assert_eq!(store.addresses().unwrap().len(), 2);
    }

    #[test]
    fn dedup_does_not_rewrite_existing_file() {
        let (_dir, store) = open(16);
        let data = vec![0x42u8; 16];
        let address = store.write(&data).unwrap().address;
        // Content determines the name, so an existing file is trusted as-is.
        fs::write(store.block_path(&address), [0x43u8; 16]).unwrap();
        store.write(&data).unwrap();
        assert_eq!(fs::read(store.block_path(&address)).unwrap(), vec![0x43u8; 16]);
    }

    #[test]
    fn concurrent_identical_writes_produce_one_file() {
        use std::sync::Arc;
        use std::thread;

        let (_dir, store) = open(4096);
        let store = Arc::new(store);
        let data = Arc::new(vec![0x5Au8; 4096]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let data = Arc::clone(&data);
                thread::spawn(move || store.write(&data).unwrap())
            })
            .collect();

        let outcomes: Vec<WriteOutcome> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        let written = outcomes
            .iter()
            .filter(|o| o.disposition == WriteDisposition::Written)
            .count();
        assert_eq!(written, 1);
        assert!(outcomes.iter().all(|o| o.address == outcomes[0].address));
        assert_eq!(file_count(&store), 1);
    }

    // -----------------------------------------------------------------------
    // Size checks
    // -----------------------------------------------------------------------

    #[test]
    fn off_by_one_sizes_are_rejected() {
        let (_dir, store) = open(4096);
        for len in [4095usize, 4097] {
            let err = store.write(&vec![0x01u8; len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(matches!(
                err,
                StoreError::InvalidBlockSize { expected: 4096, actual } if actual == len as u64
            ));
        }
        assert_eq!(file_count(&store), 0);
    }

    // -----------------------------------------------------------------------
    // Read / verify / listing
    // -----------------------------------------------------------------------

    #[test]
    fn read_back_written_block() {
        let (_dir, store) = open(32);
        let data: Vec<u8> = (0..32).collect();
        let address = store.write(&data).unwrap().address;
        assert_eq!(store.read(&address).unwrap(), data);
        store.verify(&address).unwrap();
    }

    #[test]
    fn read_missing_block_is_not_found() {
        let (_dir, store) = open(32);
        let address = BlockAddress::from_digest(12345);
        assert!(!store.contains(&address).unwrap());
        let err = store.read(&address).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(a) if a == address));
    }

    #[test]
    fn undersized_block_file_is_corruption() {
        let (_dir, store) = open(32);
        let address = store.write(&[7u8; 32]).unwrap().address;
        fs::write(store.block_path(&address), [7u8; 31]).unwrap();
        let err = store.read(&address).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn verify_detects_tampered_content() {
        let (_dir, store) = open(32);
        let address = store.write(&[7u8; 32]).unwrap().address;
        fs::write(store.block_path(&address), [8u8; 32]).unwrap();
        let err = store.verify(&address).unwrap_err();
        assert!(matches!(err, StoreError::CorruptBlock { .. }));
    }

    #[test]
    fn listing_separates_blocks_and_attributes() {
        let (_dir, store) = open(8);
        let a = store.write(&[1u8; 8]).unwrap().address;
        let b = store.write(&[2u8; 8]).unwrap().address;
        store.set_attribute(&a, &AttributeRecord::default()).unwrap();
        fs::write(store.data_dir().join("README"), b"not a block").unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.addresses().unwrap(), expected);
        assert_eq!(store.attribute_addresses().unwrap(), vec![a]);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, store) = open(8);
        let address = store.write(&[3u8; 8]).unwrap().address;
        store.set_attribute(&address, &AttributeRecord::default()).unwrap();
        let names: Vec<String> = fs::read_dir(store.data_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
        assert_eq!(names.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    #[test]
    fn attribute_roundtrip_for_every_flag_combination() {
        let (_dir, store) = open(4096);
        let address = store.write(&[9u8; 4096]).unwrap().address;
        for bits in 0u8..8 {
            for block_type in [BlockType::Metadata, BlockType::CowRedundancy] {
                let record = AttributeRecord {
                    is_compressed: bits & 1 != 0,
                    is_frozen: bits & 2 != 0,
                    newly_allocated_no_cow: bits & 4 != 0,
                    block_type,
                    refresh_count: u64::from(bits) * 1000,
                    inode_link_count: u64::from(bits) + 1,
                };
                store.set_attribute(&address, &record).unwrap();
                assert_eq!(store.get_attribute(&address).unwrap(), record);
            }
        }
    }

    #[test]
    fn attribute_file_is_always_4096_bytes() {
        let (_dir, store) = open(1);
        let address = BlockAddress::from_digest(99);
        store.set_attribute(&address, &AttributeRecord::default()).unwrap();
        let len = fs::metadata(store.attribute_path(&address)).unwrap().len();
        assert_eq!(len, ATTRIBUTE_RECORD_SIZE as u64);
    }

    #[test]
    fn missing_attribute_is_not_found() {
        let (_dir, store) = open(64);
        let address = BlockAddress::from_digest(5);
        let err = store.get_attribute(&address).unwrap_err();
        assert!(matches!(err, StoreError::AttributeNotFound(a) if a == address));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn truncated_attribute_is_corruption() {
        let (_dir, store) = open(64);
        let address = BlockAddress::from_digest(5);
        store.set_attribute(&address, &AttributeRecord::default()).unwrap();
        let path = store.attribute_path(&address);
        let buf = fs::read(&path).unwrap();
        fs::write(&path, &buf[..1000]).unwrap();

        let err = store.get_attribute(&address).unwrap_err();
        assert!(matches!(
            err,
            StoreError::CorruptAttribute {
                source: AttributeError::WrongSize { actual: 1000 },
                ..
            }
        ));
    }

    #[test]
    fn attribute_is_replaced_in_place() {
        let (_dir, store) = open(64);
        let address = BlockAddress::from_digest(5);
        let frozen = AttributeRecord {
            is_frozen: true,
            ..AttributeRecord::default()
        };
        store.set_attribute(&address, &AttributeRecord::default()).unwrap();
        store.set_attribute(&address, &frozen).unwrap();
        assert_eq!(store.get_attribute(&address).unwrap(), frozen);
        assert_eq!(store.attribute_addresses().unwrap(), vec![address]);
    }

    #[test]
    fn sync_every_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            sync_mode: SyncMode::EveryWrite,
        };
        let store = BlockStore::open_with_config(dir.path(), 16, config).unwrap();
        let address = store.write(&[1u8; 16]).unwrap().address;
        store.set_attribute(&address, &AttributeRecord::default()).unwrap();
        assert!(store.contains(&address).unwrap());
        assert_eq!(store.get_attribute(&address).unwrap(), AttributeRecord::default());
        assert_eq!(store.addresses().unwrap(), vec![address]);
        assert_eq!(store.attribute_addresses().unwrap(), vec![address]);
        assert_eq!(file_count(&store), 2);
    }

    #[test]
    fn write_batch_reports_each_block() {
        let (_dir, store) = open(4);
        let a = [1u8; 4];
        let z = [0u8; 4];
        let outcomes = store.write_batch(&[&a[..], &z[..], &a[..]]).unwrap();
        let dispositions: Vec<_> = outcomes.iter().map(|o| o.disposition).collect();
        assert_eq!(
            dispositions,
            vec![
                WriteDisposition::Written,
                WriteDisposition::ZeroElided,
                WriteDisposition::Deduplicated
            ]
        );
    }
}
