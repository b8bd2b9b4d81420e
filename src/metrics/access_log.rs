//! Append-only performance log.
//!
//! One line per file served:
//!
//! ```text
//! <path>\t<size>\t<completed_at>\t<cpu_seconds>
//! ```
//!
//! `completed_at` is wall-clock seconds since the Unix epoch; both floats carry
//! exactly four decimal places. Lines appear in completion order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// One completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub path: String,
    /// Bytes of file body sent
    pub size: u64,
    pub completed_at: SystemTime,
    /// CPU time the worker consumed
    pub cpu_time: Duration,
}

impl LogRecord {
    pub fn new(path: impl Into<String>, size: u64, completed_at: SystemTime, cpu_time: Duration) -> Self {
        Self {
            path: path.into(),
            size,
            completed_at,
            cpu_time,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let completed_at = self
            .completed_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        write!(
            f,
            "{}\t{}\t{:.4}\t{:.4}",
            self.path,
            self.size,
            completed_at,
            self.cpu_time.as_secs_f64()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessLogError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("access log is closed")]
    Closed,
}

/// The shared log file. Appends are serialized by a mutex so concurrent
/// workers never interleave partial lines.
#[derive(Debug)]
pub struct AccessLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl AccessLog {
    /// Opens `path` for appending, creating it if needed. Existing content is
    /// never truncated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AccessLogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a complete line.
    ///
    /// The line is flushed before the lock is released, so a record is either
    /// entirely in the file or not at all from the point of view of the next
    /// writer.
    pub async fn append(&self, record: &LogRecord) -> Result<(), AccessLogError> {
        let line = format!("{record}\n");

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(AccessLogError::Closed)?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(path = %record.path, size = record.size, "access log record appended");
        Ok(())
    }

    /// Flushes and syncs the file, then refuses further appends. Closing twice
    /// is a no-op.
    pub async fn close(&self) -> Result<(), AccessLogError> {
        let mut guard = self.file.lock().await;
        if let Some(mut file) = guard.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
