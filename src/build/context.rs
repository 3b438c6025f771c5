//! Build context containing configuration and state for a build.

use crate::build::state::STATE_FILENAME;
use crate::config::AseforgeConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// The context provides access to all information needed to execute a build,
/// including the configuration, project root, and the directories derived
/// from it.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: AseforgeConfig,
    /// Project root directory (where aseforge.toml is located)
    project_root: PathBuf,
    /// Ignore persisted state and process everything
    force: bool,
    /// Plan only; export, inject and save nothing
    dry_run: bool,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: AseforgeConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, force: false, dry_run: false, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AseforgeConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Directory holding the asset files.
    pub fn anims_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.anims)
    }

    /// Directory sprite strips are exported into.
    pub fn sprites_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.sprites)
    }

    /// Directory holding client scripts.
    pub fn scripts_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.scripts)
    }

    /// Directory holding the fragment library.
    pub fn inject_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.inject)
    }

    /// Location of the persisted build state.
    pub fn state_path(&self) -> PathBuf {
        self.project_root.join(STATE_FILENAME)
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set force mode.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of export/injection workers (`0` in the config means one per
    /// available core).
    pub fn jobs(&self) -> usize {
        match self.config.export.jobs {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        }
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }

    /// The key a path is stored under in the build state: relative to the
    /// project root when it lives inside it.
    pub fn state_key(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.project_root).unwrap_or(path).to_path_buf()
    }
}
