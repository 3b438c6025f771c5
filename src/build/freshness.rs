//! Timestamp-based staleness detection.
//!
//! A tracked path needs processing when it has never been processed
//! successfully (it is not in the state's seen set), or when its modification
//! time is newer than the start of the last successful run.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A source file and the timestamps that decide whether it is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// When it was last processed successfully, `None` if never
    pub last_processed: Option<SystemTime>,
}

impl TrackedFile {
    /// Read the modification time of `path` from disk.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(Self { path: path.to_path_buf(), modified, last_processed: None })
    }

    /// Whether the file needs processing.
    pub fn is_stale(&self) -> bool {
        match self.last_processed {
            None => true,
            Some(processed) => self.modified > processed,
        }
    }
}

/// Read-only staleness view over a loaded state snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessTracker<'a> {
    seen: &'a BTreeSet<PathBuf>,
    last_run: Option<SystemTime>,
    force: bool,
}

impl<'a> FreshnessTracker<'a> {
    pub fn new(seen: &'a BTreeSet<PathBuf>, last_run: Option<SystemTime>) -> Self {
        Self { seen, last_run, force: false }
    }

    /// Treat every path as stale.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether `path`, last modified at `modified`, needs processing.
    pub fn is_stale(&self, path: &Path, modified: SystemTime) -> bool {
        if self.force || !self.seen.contains(path) {
            return true;
        }
        match self.last_run {
            Some(last_run) => modified > last_run,
            None => true,
        }
    }

    /// Fill in `last_processed` for a file from this snapshot.
    pub fn track(&self, mut file: TrackedFile) -> TrackedFile {
        file.last_processed =
            if self.seen.contains(&file.path) && !self.force { self.last_run } else { None };
        file
    }

    /// The stale subset of `files`, in input order.
    pub fn classify<'f>(&self, files: &'f [TrackedFile]) -> Vec<&'f TrackedFile> {
        files.iter().filter(|f| self.is_stale(&f.path, f.modified)).collect()
    }
}
