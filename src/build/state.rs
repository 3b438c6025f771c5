//! Persisted build state.
//!
//! The state is read once at the start of a run and written once at the end.
//! Nothing between those two points touches the file.
//!
//! # State Format
//!
//! Stored as JSON in `.aseforge-state.json` at the project root:
//!
//! ```json
//! {
//!   "version": 1,
//!   "last_run_time": { "secs_since_epoch": 1718000000, "nanos_since_epoch": 0 },
//!   "seen_paths": ["anims/idle.ase", "scripts/attacks/jab.gml"],
//!   "anim_hashes": {
//!     "anims/idle.ase": { "idle": "5a1c..." }
//!   },
//!   "dependencies": {
//!     "scripts/attacks/jab.gml": ["inject/combo.gml"]
//!   }
//! }
//! ```

use crate::build::{AnimHashCache, DependencyGraph, FreshnessTracker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Current state format version.
const STATE_VERSION: u32 = 1;

/// Default state filename.
pub const STATE_FILENAME: &str = ".aseforge-state.json";

/// Error during state operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Version mismatch
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Everything carried from one run to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    /// State format version
    pub version: u32,
    /// Start time of the last run that saved state
    #[serde(default)]
    pub last_run_time: Option<SystemTime>,
    /// Paths processed successfully as of `last_run_time`
    #[serde(default)]
    pub seen_paths: BTreeSet<PathBuf>,
    /// Per-asset animation fingerprints
    #[serde(default)]
    pub anim_hashes: AnimHashCache,
    /// Client script dependencies on fragment files
    #[serde(default)]
    pub dependencies: DependencyGraph,
}

impl BuildState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            last_run_time: None,
            seen_paths: BTreeSet::new(),
            anim_hashes: AnimHashCache::new(),
            dependencies: DependencyGraph::new(),
        }
    }

    /// Load state from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let state: BuildState = serde_json::from_reader(reader)?;

        if state.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_VERSION,
                found: state.version,
            });
        }

        Ok(Some(state))
    }

    /// Load state from the default location in the project root.
    pub fn load_from_dir(root: &Path) -> Result<Option<Self>, StateError> {
        Self::load(&root.join(STATE_FILENAME))
    }

    /// Save the state to a file.
    ///
    /// Writes to a sibling temporary file first and renames it over the
    /// target, so a crash mid-write leaves the previous state intact.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Save the state to the default location in the project root.
    pub fn save_to_dir(&self, root: &Path) -> Result<(), StateError> {
        self.save(&root.join(STATE_FILENAME))
    }

    /// Staleness view over this snapshot.
    pub fn freshness(&self) -> FreshnessTracker<'_> {
        FreshnessTracker::new(&self.seen_paths, self.last_run_time)
    }

    /// Whether `path` needs processing.
    pub fn is_stale(&self, path: &Path, modified: SystemTime) -> bool {
        self.freshness().is_stale(path, modified)
    }

    /// Mark a path as successfully processed.
    pub fn mark_seen(&mut self, path: &Path) {
        self.seen_paths.insert(path.to_path_buf());
    }

    /// Forget a path, so it is stale next run.
    pub fn unmark_seen(&mut self, path: &Path) -> bool {
        self.seen_paths.remove(path)
    }
}

impl Default for BuildState {
    fn default() -> Self {
        Self::new()
    }
}
