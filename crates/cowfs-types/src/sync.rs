use serde::{Deserialize, Serialize};

/// Flush/sync strategy for block, attribute and journal writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

impl SyncMode {
    /// Returns `true` if writes must reach stable storage before returning.
    pub fn syncs(&self) -> bool {
        matches!(self, Self::EveryWrite)
    }
}
