//! Source file discovery for the build system.
//!
//! Finds asset files under the anims root and client scripts under the
//! scripts root, and reads their modification times.

use crate::build::{BuildContext, TrackedFile};
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions of asset files.
pub const ASSET_EXTENSIONS: &[&str] = &["ase", "aseprite"];

/// Extension of client scripts.
pub const SCRIPT_EXTENSION: &str = "gml";

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
    /// IO error reading a discovered file
    Io(PathBuf, std::io::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
            DiscoveryError::Io(path, err) => {
                write!(f, "IO error during discovery of {}: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Discover files under `base_dir` matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match
///
/// # Returns
/// Sorted list of matching file paths. A missing `base_dir` yields none.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let full_pattern = base_dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let paths =
        glob(&pattern_str).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                // Log but continue on glob errors
                warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Whether `path` is an asset file.
pub fn is_asset_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ASSET_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Whether `path` is a client script.
pub fn is_script_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

/// All asset files under the anims root.
pub fn discover_assets(ctx: &BuildContext) -> Result<Vec<TrackedFile>, DiscoveryError> {
    let anims = ctx.anims_dir();
    let mut files = Vec::new();
    for ext in ASSET_EXTENSIONS {
        files.extend(discover_files(&anims, &format!("**/*.{}", ext))?);
    }
    files.sort();
    files.dedup();
    track_all(files)
}

/// All client scripts under the scripts root.
///
/// The inject library is excluded even when it is nested in the scripts
/// root; library files are dependencies, never clients.
pub fn discover_scripts(ctx: &BuildContext) -> Result<Vec<TrackedFile>, DiscoveryError> {
    let inject = ctx.inject_dir();
    let files = discover_files(&ctx.scripts_dir(), &format!("**/*.{}", SCRIPT_EXTENSION))?
        .into_iter()
        .filter(|p| !p.starts_with(&inject))
        .collect();
    track_all(files)
}

/// All library files under the inject root.
pub fn discover_library_files(ctx: &BuildContext) -> Result<Vec<TrackedFile>, DiscoveryError> {
    track_all(discover_files(&ctx.inject_dir(), &format!("**/*.{}", SCRIPT_EXTENSION))?)
}

fn track_all(files: Vec<PathBuf>) -> Result<Vec<TrackedFile>, DiscoveryError> {
    files
        .into_iter()
        .map(|path| TrackedFile::from_path(&path).map_err(|e| DiscoveryError::Io(path, e)))
        .collect()
}
