use cowfs_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{JournalError, JournalResult};

/// Number of parameter slots in a record.
pub const MAX_PARAMS: usize = 7;

/// On-disk size of one record.
///
/// ```text
/// [8 bytes: seconds]
/// [8 bytes: nanoseconds]
/// [8 bytes: action]
/// [56 bytes: 7 parameters]
/// ```
///
/// All fields are native-endian u64, matching the in-memory layout the
/// journal has always used on its host.
pub const LOG_ENTRY_SIZE: usize = 8 * (3 + MAX_PARAMS);

/// One journaled action. Immutable once appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the action was journaled.
    pub timestamp: Timestamp,
    /// Caller-defined action code.
    pub action: u64,
    /// Caller-defined parameters; unused slots are zero.
    pub params: [u64; MAX_PARAMS],
}

impl LogEntry {
    /// Build an entry, zero-filling unused parameter slots.
    pub fn new(timestamp: Timestamp, action: u64, params: &[u64]) -> JournalResult<Self> {
        if params.len() > MAX_PARAMS {
            return Err(JournalError::TooManyParams {
                count: params.len(),
                max: MAX_PARAMS,
            });
        }
        let mut slots = [0u64; MAX_PARAMS];
        slots[..params.len()].copy_from_slice(params);
        Ok(Self {
            timestamp,
            action,
            params: slots,
        })
    }

    /// Encode into the fixed on-disk record.
    pub fn encode(&self) -> [u8; LOG_ENTRY_SIZE] {
        let mut buf = [0u8; LOG_ENTRY_SIZE];
        let words = [self.timestamp.secs, u64::from(self.timestamp.nanos), self.action]
            .into_iter()
            .chain(self.params);
        for (chunk, word) in buf.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        buf
    }

    /// Decode a fixed on-disk record.
    pub fn decode(buf: &[u8; LOG_ENTRY_SIZE]) -> Self {
        let mut words = [0u64; 3 + MAX_PARAMS];
        for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_ne_bytes(bytes);
        }
        let mut params = [0u64; MAX_PARAMS];
        params.copy_from_slice(&words[3..]);
        Self {
            // Clock-derived nanoseconds always fit; anything larger is garbage.
            timestamp: Timestamp::new(words[0], u32::try_from(words[1]).unwrap_or(u32::MAX)),
            action: words[2],
            params,
        }
    }
}
