//! Configuration loading and discovery for `aseforge.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{AseforgeConfig, ProjectConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config filename looked up from the working directory upwards.
pub const CONFIG_FILENAME: &str = "aseforge.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse aseforge.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the Aseprite executable
    pub aseprite_path: Option<PathBuf>,
    /// Override the number of parallel jobs
    pub jobs: Option<usize>,
    /// Override double-scale export
    pub small_sprites: Option<bool>,
}

/// Find aseforge.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find aseforge.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an aseforge.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<AseforgeConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<AseforgeConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AseforgeConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no aseforge.toml is found.
///
/// The project name is the current directory name.
pub fn default_config() -> AseforgeConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    AseforgeConfig {
        project: ProjectConfig { name: project_name, ..ProjectConfig::default() },
        ..AseforgeConfig::default()
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut AseforgeConfig, overrides: &CliOverrides) {
    if let Some(ref path) = overrides.aseprite_path {
        config.export.aseprite_path = path.clone();
    }

    if let Some(jobs) = overrides.jobs {
        config.export.jobs = jobs;
    }

    if let Some(small) = overrides.small_sprites {
        config.export.small_sprites = small;
    }
}

/// Render a config as TOML, for `aseforge init`.
pub fn render_config(config: &AseforgeConfig) -> String {
    toml::to_string_pretty(config).unwrap_or_default()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
