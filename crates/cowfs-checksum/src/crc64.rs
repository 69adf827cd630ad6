use std::sync::LazyLock;

/// Reversed CRC-64/ECMA-182 polynomial.
pub const POLYNOMIAL: u64 = 0xC96C_5795_D787_0F42;

const INITIAL: u64 = u64::MAX;

/// Byte-indexed lookup table, built once and shared by every engine.
static TABLE: LazyLock<[u64; 256]> = LazyLock::new(build_table);

fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut crc = i as u64;
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
        }
        *slot = crc;
    }
    table
}

/// Byte order of a finalized checksum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    /// The numeric value as computed.
    #[default]
    Little,
    /// Byte-swapped, the order most CRC-64 tools (7-Zip, `xz --list`) display.
    Big,
}

/// Incremental CRC-64 engine (reflected ECMA-182, all-ones init, final complement).
///
/// Feeding a buffer in several `update` calls yields the same checksum as
/// feeding it whole.
#[derive(Clone, Debug)]
pub struct Crc64 {
    value: u64,
}

impl Crc64 {
    /// Create an engine with the all-ones initial accumulator.
    pub fn new() -> Self {
        Self { value: INITIAL }
    }

    /// Fold `data` into the accumulator.
    pub fn update(&mut self, data: &[u8]) {
        let table = &*TABLE;
        let mut crc = self.value;
        for &byte in data {
            crc = table[((crc ^ u64::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.value = crc;
    }

    /// Final checksum in the requested byte order. Does not consume the engine.
    pub fn finalize(&self, endian: Endian) -> u64 {
        let sum = self.value ^ u64::MAX;
        match endian {
            Endian::Little => sum,
            Endian::Big => sum.swap_bytes(),
        }
    }

    /// Final checksum as a plain numeric value.
    pub fn checksum(&self) -> u64 {
        self.finalize(Endian::Little)
    }

    /// Reset to the initial state for reuse.
    pub fn reset(&mut self) {
        self.value = INITIAL;
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot checksum of `data`.
pub fn hash(data: &[u8]) -> u64 {
    let mut engine = Crc64::new();
    engine.update(data);
    engine.checksum()
}
