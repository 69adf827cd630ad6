use std::fmt;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock instant: seconds and nanoseconds since the UNIX epoch.
///
/// Ordering: `secs` → `nanos`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since UNIX epoch.
    pub secs: u64,
    /// Sub-second nanoseconds, always below 1e9 for clock-derived values.
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp with explicit values.
    pub const fn new(secs: u64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// The zero timestamp, used when the clock cannot be read.
    pub const fn zero() -> Self {
        Self { secs: 0, nanos: 0 }
    }

    /// Read the current wall-clock time.
    ///
    /// Fails if the system clock is set before the UNIX epoch.
    pub fn now() -> Result<Self, SystemTimeError> {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH)?;
        Ok(Self {
            secs: elapsed.as_secs(),
            nanos: elapsed.subsec_nanos(),
        })
    }

    /// Returns `true` if this instant falls strictly before `secs`.
    pub fn is_before_secs(&self, secs: u64) -> bool {
        self.secs < secs
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}.{:09})", self.secs, self.nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}
