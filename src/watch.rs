//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for the `aseforge build --watch`
//! command. Every relevant change triggers one incremental build; failed
//! units are reported and the watcher keeps running.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use tracing::{debug, warn};

use crate::build::{is_asset_file, is_script_file, BuildContext, BuildResult, IncrementalBuild};

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    ChannelError(String),
    /// None of the project's source directories exist
    SourceNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelError(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::SourceNotFound(path) => {
                write!(f, "Source directory not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Tracks failing units across build iterations for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Units that failed in the previous build
    failing: HashSet<String>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with new build result, returns the units that recovered.
    ///
    /// A unit that was not attempted this time (e.g. its asset was deleted)
    /// also counts as recovered.
    pub fn update(&mut self, result: &BuildResult) -> Vec<String> {
        let current: HashSet<String> = result.failures().iter().map(|u| u.unit_id()).collect();

        let mut fixed: Vec<String> = self.failing.difference(&current).cloned().collect();
        fixed.sort();

        self.failing = current;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing units
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Directories to watch: the anims, scripts and inject roots that exist.
///
/// A root nested inside another watched root is covered by the recursive
/// watch and left out.
pub fn watch_roots(ctx: &BuildContext) -> Vec<PathBuf> {
    let mut candidates = vec![ctx.anims_dir(), ctx.scripts_dir(), ctx.inject_dir()];
    candidates.retain(|dir| dir.is_dir());
    candidates.sort();
    candidates.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in candidates {
        if !roots.iter().any(|r| dir.starts_with(r)) {
            roots.push(dir);
        }
    }
    roots
}

/// Check if a changed path can affect the build.
///
/// Sprite strips and the state file are build outputs and never count.
pub fn is_relevant_file(path: &Path) -> bool {
    is_asset_file(path) || is_script_file(path)
}

/// Run one build and report it. Fatal build errors are reported, not returned.
///
/// `--force` applies to the first build that completes. Once it has saved a
/// fresh state, `ctx` is switched to incremental rebuilds.
fn rebuild(ctx: &mut BuildContext, tracker: &mut ErrorTracker) -> HashSet<PathBuf> {
    if ctx.config().watch.clear_screen {
        clear_screen();
    }
    println!("[{}] Building...", timestamp());

    match IncrementalBuild::new(ctx.clone()).run() {
        Ok(result) => {
            if ctx.is_force() {
                debug!("forced build done, rebuilding incrementally from now on");
                *ctx = ctx.clone().with_force(false);
            }
            let fixed = tracker.update(&result);
            print_build_result(&result, &fixed);
            result.all_outputs().into_iter().cloned().collect()
        }
        Err(e) => {
            eprintln!("[{}] Error: {}", timestamp(), e);
            HashSet::new()
        }
    }
}

/// Watch for file changes and rebuild automatically.
///
/// This function blocks and runs until interrupted (Ctrl+C).
///
/// # Returns
/// * `Ok(())` if watch mode exits cleanly (shouldn't happen normally)
/// * `Err(WatchError)` if watch setup fails
///
/// # Example
/// ```ignore
/// let context = BuildContext::new(config, project_root);
/// watch_and_rebuild(context)?;
/// ```
pub fn watch_and_rebuild(mut ctx: BuildContext) -> Result<(), WatchError> {
    let roots = watch_roots(&ctx);
    if roots.is_empty() {
        return Err(WatchError::SourceNotFound(ctx.anims_dir()));
    }

    // Create channel for debounced events
    let (tx, rx) = channel();

    // Create debounced watcher
    let debounce_duration = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    for root in &roots {
        debouncer.watcher().watch(root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
    }

    let mut error_tracker = ErrorTracker::new();

    // Files this process wrote in the last build; their events are echoes.
    let mut own_writes = rebuild(&mut ctx, &mut error_tracker);
    println!("[{}] Watching for changes...", timestamp());

    // Watch loop
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant_changes: Vec<_> = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any) && is_relevant_file(&e.path))
                    .filter(|e| !own_writes.remove(&e.path))
                    .collect();

                if relevant_changes.is_empty() {
                    debug!(events = events.len(), "ignoring events");
                    continue;
                }

                for event in &relevant_changes {
                    if let Some(name) = event.path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }

                own_writes = rebuild(&mut ctx, &mut error_tracker);
                println!("[{}] Watching for changes...", timestamp());
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                warn!(?error, "watch error, continuing");
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

/// Print build result to console with recovered unit notifications
fn print_build_result(result: &BuildResult, fixed: &[String]) {
    // Report fixed units first (before showing new errors)
    for unit in fixed {
        println!("[{}] Fixed: {}", timestamp(), unit);
    }

    if result.is_success() {
        println!(
            "[{}] Build complete ({}) - Exported: {} | Injected: {} | Skipped: {}",
            timestamp(),
            format_duration(result.total_duration),
            result.exported_count(),
            result.injected_count(),
            result.skipped_count()
        );
    } else {
        let error_count = result.failed_count();
        println!(
            "[{}] Build failed ({}) - {} error{}",
            timestamp(),
            format_duration(result.total_duration),
            error_count,
            if error_count == 1 { "" } else { "s" }
        );

        for unit in result.failures() {
            eprintln!("[{}] Error in {}: {}", timestamp(), unit.unit_id(), unit.status);
        }
    }
}
