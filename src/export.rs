//! Sprite strip export.
//!
//! The build hands every animation to an [`Exporter`]. [`AsepriteCli`] runs
//! the Aseprite command line tool in batch mode; tests substitute their own
//! implementation.
//!
//! Strips are named `<base>_strip<frames>.png`. The base name is the asset's
//! folder path under the anims root joined with `_`, followed by the
//! animation name, so `anims/attacks/jab.ase` with animation `dattack`
//! exports to `attacks_dattack_strip6.png`.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exporting a single animation failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// The export tool is not installed or not at the configured path
    #[error("export tool not found: {}", .0.display())]
    ToolNotFound(PathBuf),
    /// The tool ran and reported failure
    #[error("export tool exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    /// The tool ran past the deadline and was killed
    #[error("export timed out after {0:?}")]
    Timeout(Duration),
    /// Filesystem error around the export
    #[error("I/O error during export: {0}")]
    Io(#[from] io::Error),
}

/// One animation to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Source asset file
    pub source: PathBuf,
    /// First frame (0-based, inclusive)
    pub start: i32,
    /// Last frame (0-based, inclusive)
    pub end: i32,
    /// Integer scale factor
    pub scale: u32,
    /// Strip to write
    pub destination: PathBuf,
}

impl ExportRequest {
    /// Number of frames in the request; zero for reversed ranges.
    pub fn frame_count(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

/// Writes sprite strips for frame ranges of an asset.
pub trait Exporter: Send + Sync {
    fn export(&self, request: &ExportRequest) -> Result<(), ExportError>;
}

/// Exporter backed by the Aseprite CLI.
#[derive(Debug, Clone)]
pub struct AsepriteCli {
    program: PathBuf,
    timeout: Duration,
}

impl AsepriteCli {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { program: program.into(), timeout }
    }

    /// Arguments for one export, without the program name.
    pub fn arguments(request: &ExportRequest) -> Vec<String> {
        vec![
            "-b".to_string(),
            request.source.to_string_lossy().into_owned(),
            "--frame-range".to_string(),
            format!("{},{}", request.start, request.end),
            "--scale".to_string(),
            request.scale.to_string(),
            "--sheet".to_string(),
            request.destination.to_string_lossy().into_owned(),
            "--sheet-type".to_string(),
            "horizontal".to_string(),
        ]
    }

    fn spawn(&self, request: &ExportRequest) -> Result<Child, ExportError> {
        Command::new(&self.program)
            .args(Self::arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExportError::ToolNotFound(self.program.clone()),
                _ => ExportError::Io(e),
            })
    }
}

impl Exporter for AsepriteCli {
    fn export(&self, request: &ExportRequest) -> Result<(), ExportError> {
        if request.is_empty() {
            debug!(source = %request.source.display(), "empty frame range, nothing to export");
            return Ok(());
        }
        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut child = self.spawn(request)?;
        let stderr = child.stderr.take().map(drain);
        let status = wait_with_timeout(&mut child, self.timeout)?;

        if status.success() {
            Ok(())
        } else {
            let stderr = stderr.and_then(|reader| reader.join().ok()).unwrap_or_default();
            Err(ExportError::Failed { status, stderr: stderr.trim().to_string() })
        }
    }
}

/// Read a child's stderr to the end on its own thread. The pipe has to be
/// emptied while the child runs; a full pipe blocks the child's writes.
fn drain(mut pipe: ChildStderr) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut bytes) {
            debug!(error = %e, "stopped reading export tool stderr");
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// Wait for `child`, killing it once `timeout` elapses.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ExportError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            child.wait()?;
            return Err(ExportError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Base name for an animation's strip.
///
/// `asset` must live under `anims_root`; otherwise only the animation name is
/// used.
pub fn sprite_base_name(anims_root: &Path, asset: &Path, animation: &str) -> String {
    let mut parts: Vec<String> = asset
        .strip_prefix(anims_root)
        .ok()
        .and_then(Path::parent)
        .map(|dir| dir.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect())
        .unwrap_or_default();
    parts.push(animation.to_string());
    parts.join("_")
}

/// `<sprites_dir>/<base>_strip<frames>.png`
pub fn strip_path(sprites_dir: &Path, base_name: &str, frame_count: usize) -> PathBuf {
    sprites_dir.join(format!("{}_strip{}.png", base_name, frame_count))
}

/// Remove earlier strips for `base_name`, whatever their frame count.
///
/// Returns the number of files removed.
pub fn remove_old_strips(sprites_dir: &Path, base_name: &str) -> io::Result<usize> {
    let pattern = sprites_dir
        .join(format!("{}_strip*.png", glob::Pattern::escape(base_name)))
        .to_string_lossy()
        .into_owned();
    let entries = glob::glob(&pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let mut removed = 0;
    for entry in entries.flatten() {
        if is_strip_of(&entry, base_name) {
            fs::remove_file(&entry)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// `*` also matches `_strip` followed by anything, so `run` would catch
/// `run_strip_extra_strip4.png`. Only a numeric suffix counts.
fn is_strip_of(path: &Path, base_name: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(base_name))
        .and_then(|n| n.strip_prefix("_strip"))
        .and_then(|n| n.strip_suffix(".png"))
        .is_some_and(|count| !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()))
}
