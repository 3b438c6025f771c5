//! Configuration schema types for `aseforge.toml`
//!
//! Defines the structure and validation rules for aseforge project configuration.

use crate::color::{parse_tag_color, TagColor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Project layout section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory containing `.ase`/`.aseprite` files
    #[serde(default = "default_anims")]
    pub anims: PathBuf,
    /// Directory exported sprite strips are written to
    #[serde(default = "default_sprites")]
    pub sprites: PathBuf,
    /// Directory containing client `.gml` scripts
    #[serde(default = "default_scripts")]
    pub scripts: PathBuf,
    /// Directory containing the injectable fragment library
    #[serde(default = "default_inject")]
    pub inject: PathBuf,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_anims() -> PathBuf {
    PathBuf::from("anims")
}

fn default_sprites() -> PathBuf {
    PathBuf::from("sprites")
}

fn default_scripts() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_inject() -> PathBuf {
    PathBuf::from("inject")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            anims: default_anims(),
            sprites: default_sprites(),
            scripts: default_scripts(),
            inject: default_inject(),
        }
    }
}

/// Which tag colors mark animations and which mark windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Tag colors that delimit animations
    #[serde(default = "default_animation_colors")]
    pub animation_colors: Vec<String>,
    /// Tag colors that delimit windows inside an animation
    #[serde(default = "default_window_colors")]
    pub window_colors: Vec<String>,
}

fn default_animation_colors() -> Vec<String> {
    vec!["green".to_string()]
}

fn default_window_colors() -> Vec<String> {
    vec!["orange".to_string()]
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            animation_colors: default_animation_colors(),
            window_colors: default_window_colors(),
        }
    }
}

/// Parsed tag color sets, ready for decomposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagColorSets {
    pub animation: BTreeSet<TagColor>,
    pub window: BTreeSet<TagColor>,
}

/// Sprite export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Path to the Aseprite executable
    #[serde(default = "default_aseprite_path")]
    pub aseprite_path: PathBuf,
    /// Export at double scale
    #[serde(default)]
    pub small_sprites: bool,
    /// Seconds before a single export is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Parallel export workers (0 = available parallelism)
    #[serde(default)]
    pub jobs: usize,
}

fn default_aseprite_path() -> PathBuf {
    PathBuf::from("aseprite")
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            aseprite_path: default_aseprite_path(),
            small_sprites: false,
            timeout_secs: default_timeout_secs(),
            jobs: 0,
        }
    }
}

impl ExportConfig {
    /// Scale factor passed to the exporter.
    pub fn scale(&self) -> u32 {
        if self.small_sprites {
            2
        } else {
            1
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    200
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

/// Complete aseforge.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AseforgeConfig {
    /// Project layout
    #[serde(default)]
    pub project: ProjectConfig,
    /// Tag color roles
    #[serde(default)]
    pub tags: TagsConfig,
    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "tags.window_colors")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aseforge.toml: '{}' {}", self.field, self.message)
    }
}

impl AseforgeConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        validate_colors(&mut errors, "tags.animation_colors", &self.tags.animation_colors);
        validate_colors(&mut errors, "tags.window_colors", &self.tags.window_colors);

        if self.export.timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "export.timeout_secs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.export.aseprite_path.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "export.aseprite_path".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Parse the configured tag colors.
    ///
    /// Fails with the same messages as [`validate`](Self::validate) for the
    /// `tags` section.
    pub fn tag_colors(&self) -> Result<TagColorSets, Vec<ConfigValidationError>> {
        let mut errors = Vec::new();
        validate_colors(&mut errors, "tags.animation_colors", &self.tags.animation_colors);
        validate_colors(&mut errors, "tags.window_colors", &self.tags.window_colors);
        if !errors.is_empty() {
            return Err(errors);
        }

        let parse = |list: &[String]| list.iter().filter_map(|c| parse_tag_color(c).ok()).collect();
        Ok(TagColorSets {
            animation: parse(&self.tags.animation_colors),
            window: parse(&self.tags.window_colors),
        })
    }
}

fn validate_colors(errors: &mut Vec<ConfigValidationError>, field: &str, colors: &[String]) {
    if colors.is_empty() {
        errors.push(ConfigValidationError {
            field: field.to_string(),
            message: "must contain at least one color".to_string(),
        });
    }
    for (i, color) in colors.iter().enumerate() {
        if let Err(e) = parse_tag_color(color) {
            errors.push(ConfigValidationError {
                field: format!("{}[{}]", field, i),
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AseforgeConfig::default();
        assert!(config.is_valid());
        assert_eq!(config.project.anims, PathBuf::from("anims"));
        assert_eq!(config.export.scale(), 1);
    }

    #[test]
    fn test_parse_full_config() {
        let config: AseforgeConfig = toml::from_str(
            r##"
[project]
name = "zetterburn"
anims = "art/anims"

[tags]
animation_colors = ["red", "#00ff00"]
window_colors = ["blue"]

[export]
small_sprites = true
timeout_secs = 5
jobs = 3

[watch]
debounce_ms = 50
"##,
        )
        .unwrap();

        assert_eq!(config.project.name, "zetterburn");
        assert_eq!(config.project.anims, PathBuf::from("art/anims"));
        assert_eq!(config.project.sprites, PathBuf::from("sprites"));
        assert_eq!(config.export.scale(), 2);
        assert_eq!(config.export.jobs, 3);
        assert_eq!(config.watch.debounce_ms, 50);

        let colors = config.tag_colors().unwrap();
        assert_eq!(colors.animation, BTreeSet::from([TagColor::RED, TagColor::rgb(0, 255, 0)]));
        assert_eq!(colors.window, BTreeSet::from([TagColor::BLUE]));
    }

    #[test]
    fn test_empty_color_sets_invalid() {
        let mut config = AseforgeConfig::default();
        config.tags.animation_colors.clear();
        config.tags.window_colors.clear();

        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "tags.animation_colors");
        assert!(config.tag_colors().is_err());
    }

    #[test]
    fn test_unknown_color_invalid() {
        let mut config = AseforgeConfig::default();
        config.tags.window_colors = vec!["blue".to_string(), "teal".to_string()];

        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "tags.window_colors[1]");
        assert!(errors[0].to_string().contains("teal"));
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = AseforgeConfig::default();
        config.export.timeout_secs = 0;
        assert!(!config.is_valid());
    }
}
