use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cowfs_types::{SyncMode, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::entry::{LogEntry, LOG_ENTRY_SIZE};
use crate::error::{JournalError, JournalResult};

/// Name of the journal file inside the log directory.
pub const LOG_FILE: &str = "log";

/// Transient file that only exists while a truncation is in progress.
pub const LOG_NEW_FILE: &str = "log.new";

/// Configuration for the journal.
#[derive(Clone, Debug, Default)]
pub struct JournalConfig {
    /// Sync strategy for appends. Truncation always syncs before replacing.
    pub sync_mode: SyncMode,
}

/// Outcome of a truncation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateReport {
    /// Leading entries dropped for being older than the cutoff.
    pub discarded: u64,
    /// Entries copied into the new log.
    pub retained: u64,
}

/// Append-only journal of fixed-size records.
///
/// Every call opens and closes its own file handle. Appends from several
/// threads are safe (each record is a single append-mode write), but
/// `truncate` must not run concurrently with `append` on the same directory;
/// callers quiesce appenders or hold an external lock.
pub struct JournalLog {
    log_dir: PathBuf,
    config: JournalConfig,
    clock: Arc<dyn Clock>,
}

enum Record {
    Full,
    Eof,
    Partial(usize),
}

/// Read one record, distinguishing a clean end of file from a torn tail.
fn read_record(reader: &mut impl Read, buf: &mut [u8; LOG_ENTRY_SIZE]) -> io::Result<Record> {
    let mut filled = 0;
    while filled < LOG_ENTRY_SIZE {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(match filled {
        0 => Record::Eof,
        LOG_ENTRY_SIZE => Record::Full,
        n => Record::Partial(n),
    })
}

impl JournalLog {
    /// Open (or create) the journal directory.
    pub fn open(log_dir: impl AsRef<Path>) -> JournalResult<Self> {
        Self::open_with_config(log_dir, JournalConfig::default())
    }

    /// Open (or create) the journal directory with explicit configuration.
    pub fn open_with_config(log_dir: impl AsRef<Path>, config: JournalConfig) -> JournalResult<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;
        Ok(Self {
            log_dir,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to stamp appended entries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The journal directory.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the journal file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }

    fn new_log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_NEW_FILE)
    }

    /// Append an action stamped with the current time.
    ///
    /// At most [`MAX_PARAMS`](crate::MAX_PARAMS) parameters; the rest are
    /// zero. If the clock cannot be read the entry is stamped with zero and
    /// a warning is logged; the append still happens.
    pub fn append(&self, action: u64, params: &[u64]) -> JournalResult<LogEntry> {
        let timestamp = self.clock.now().unwrap_or_else(|| {
            warn!(action, "failed to read clock for journal entry; using zero timestamp");
            Timestamp::zero()
        });
        let entry = LogEntry::new(timestamp, action, params)?;
        self.append_entry(&entry)?;
        Ok(entry)
    }

    /// Append a caller-built entry as is.
    ///
    /// A partial record left at the end of the log by an interrupted append
    /// is cut off first, so every record stays aligned. A failed write is
    /// rolled back to the previous length.
    pub fn append_entry(&self, entry: &LogEntry) -> JournalResult<()> {
        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Open { path, source })?;

        let len = file.metadata()?.len();
        let torn = len % LOG_ENTRY_SIZE as u64;
        let aligned = len - torn;
        if torn != 0 {
            warn!(torn, "discarding partial record at end of journal before append");
            file.set_len(aligned)?;
        }

        if let Err(e) = file.write_all(&entry.encode()) {
            if let Err(rollback) = file.set_len(aligned) {
                warn!(error = %rollback, "failed to roll back partial journal append");
            }
            return Err(e.into());
        }
        if self.config.sync_mode.syncs() {
            file.sync_data()?;
        }

        debug!(action = entry.action, timestamp = %entry.timestamp, "journal append");
        Ok(())
    }

    /// Up to `n` most recent entries, newest first.
    ///
    /// Returns every entry if fewer than `n` exist, and nothing for `n <= 0`
    /// or when nothing has been appended yet. Trailing bytes that do not form
    /// a whole record are skipped.
    pub fn recent(&self, n: i64) -> JournalResult<Vec<LogEntry>> {
        if n <= 0 {
            return Ok(Vec::new());
        }
        let Some(mut file) = self.open_existing()? else {
            return Ok(Vec::new());
        };

        let len = file.metadata()?.len();
        let whole = len / LOG_ENTRY_SIZE as u64;
        let torn = len % LOG_ENTRY_SIZE as u64;
        if torn != 0 {
            warn!(torn, "journal ends with a partial record; ignoring it");
        }

        let count = whole.min(n as u64);
        let mut entries = Vec::with_capacity(count as usize);
        let mut buf = [0u8; LOG_ENTRY_SIZE];
        for i in 0..count {
            // i < count <= whole, so the record lies entirely inside the file.
            let offset = (whole - 1 - i) * LOG_ENTRY_SIZE as u64;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
            entries.push(LogEntry::decode(&buf));
        }
        Ok(entries)
    }

    /// Every entry in append order.
    pub fn entries(&self) -> JournalResult<Vec<LogEntry>> {
        let Some(file) = self.open_existing()? else {
            return Ok(Vec::new());
        };
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut buf = [0u8; LOG_ENTRY_SIZE];
        loop {
            match read_record(&mut reader, &mut buf)? {
                Record::Full => entries.push(LogEntry::decode(&buf)),
                Record::Eof => break,
                Record::Partial(n) => {
                    warn!(bytes = n, "journal ends with a partial record; stopping scan");
                    break;
                }
            }
        }
        Ok(entries)
    }

    /// Number of whole records in the journal.
    pub fn len(&self) -> JournalResult<u64> {
        match fs::metadata(self.log_path()) {
            Ok(meta) => Ok(meta.len() / LOG_ENTRY_SIZE as u64),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns `true` if the journal holds no whole record.
    pub fn is_empty(&self) -> JournalResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every leading entry stamped strictly before `cutoff_secs`.
    ///
    /// Scans forward past stale entries, copies the first fresh entry and
    /// everything after it into `log.new`, syncs it, renames it over `log`
    /// and syncs the directory. Copying stops at a torn tail. Entries older
    /// than the cutoff that appear after a fresh one are kept, preserving
    /// order.
    pub fn truncate(&self, cutoff_secs: u64) -> JournalResult<TruncateReport> {
        let Some(file) = self.open_existing()? else {
            return Ok(TruncateReport::default());
        };

        let new_path = self.new_log_path();
        let new_file = File::create(&new_path).map_err(|source| JournalError::Open {
            path: new_path.clone(),
            source,
        })?;

        let copied = copy_retained(BufReader::new(file), BufWriter::new(new_file), cutoff_secs);
        let report = match copied {
            Ok(report) => report,
            Err(e) => {
                let _ = fs::remove_file(&new_path);
                return Err(e.into());
            }
        };

        let path = self.log_path();
        if let Err(source) = fs::rename(&new_path, &path) {
            let _ = fs::remove_file(&new_path);
            return Err(JournalError::Replace { path, source });
        }
        File::open(&self.log_dir)?.sync_all()?;

        debug!(
            cutoff_secs,
            discarded = report.discarded,
            retained = report.retained,
            "journal truncated"
        );
        Ok(report)
    }

    fn open_existing(&self) -> JournalResult<Option<File>> {
        let path = self.log_path();
        match File::open(&path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(JournalError::Open { path, source }),
        }
    }
}

fn copy_retained(
    mut reader: impl Read,
    mut writer: BufWriter<File>,
    cutoff_secs: u64,
) -> io::Result<TruncateReport> {
    let mut report = TruncateReport::default();
    let mut buf = [0u8; LOG_ENTRY_SIZE];
    let mut copying = false;

    loop {
        match read_record(&mut reader, &mut buf)? {
            Record::Full => {}
            Record::Eof => break,
            Record::Partial(n) => {
                warn!(bytes = n, "partial record at end of journal dropped during truncation");
                break;
            }
        }
        if !copying && LogEntry::decode(&buf).timestamp.is_before_secs(cutoff_secs) {
            report.discarded += 1;
            continue;
        }
        copying = true;
        writer.write_all(&buf)?;
        report.retained += 1;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(report)
}

impl std::fmt::Debug for JournalLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalLog")
            .field("log_dir", &self.log_dir)
            .field("config", &self.config)
            .finish()
    }
}
