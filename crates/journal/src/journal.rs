//! Append-only result log, one file per image folder

use crate::Result;
use anyhow::Context;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// File name of the log written next to the images
pub const LOG_FILE_NAME: &str = "log.txt";

/// Serializes appends to `<folder>/log.txt`
///
/// Each log file has its own lock, created on first use and kept for the
/// life of the process. Two appends to the same file never interleave;
/// appends to different folders proceed in parallel. Line order follows
/// lock acquisition, not event order.
pub struct ResultLog {
    /// Log path -> write lock
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    /// Lines written since startup
    appended: AtomicU64,
}

impl ResultLog {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            appended: AtomicU64::new(0),
        }
    }

    /// Path of the log for images in `folder`
    pub fn log_path(folder: &Path) -> PathBuf {
        folder.join(LOG_FILE_NAME)
    }

    /// Append `line` plus a newline to `<folder>/log.txt`, creating it if needed
    ///
    /// Blocks on file I/O; call from a blocking context.
    pub fn append(&self, folder: &Path, line: &str) -> Result<PathBuf> {
        let path = Self::log_path(folder);

        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');

        let lock = self.lock_for(&path);
        let _guard = lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        file.write_all(buffer.as_bytes())
            .with_context(|| format!("Failed to append to log file: {}", path.display()))?;

        self.appended.fetch_add(1, Ordering::Relaxed);
        debug!(log = %path.display(), "Appended result line");

        Ok(path)
    }

    /// Number of lines appended since startup
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Number of distinct log files written so far
    pub fn log_count(&self) -> usize {
        self.locks.len()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(path) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new()
    }
}
