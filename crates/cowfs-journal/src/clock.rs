use cowfs_types::Timestamp;

/// Source of wall-clock time for journal entries.
pub trait Clock: Send + Sync {
    /// Current time, or `None` if the clock cannot be read.
    fn now(&self) -> Option<Timestamp>;
}

/// The system real-time clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<Timestamp> {
        Timestamp::now().ok()
    }
}
