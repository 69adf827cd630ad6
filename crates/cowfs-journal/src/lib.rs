//! Action journal for the COW overlay.
//!
//! A flat file of fixed-size [`LogEntry`] records under a log directory.
//! Entries are appended with the current wall-clock time, read back newest
//! first, and compacted by [`JournalLog::truncate`] once a checkpoint makes
//! older entries irrelevant to recovery.

pub mod clock;
pub mod entry;
pub mod error;
pub mod journal;

pub use clock::{Clock, SystemClock};
pub use entry::{LogEntry, LOG_ENTRY_SIZE, MAX_PARAMS};
pub use error::{JournalError, JournalResult};
pub use journal::{JournalConfig, JournalLog, TruncateReport, LOG_FILE, LOG_NEW_FILE};
