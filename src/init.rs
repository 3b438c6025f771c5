//! Project initialization for aseforge
//!
//! Writes a default `aseforge.toml` and the folder skeleton it points at.

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::STATE_FILENAME;
use crate::config::loader::{render_config, CONFIG_FILENAME};
use crate::config::{AseforgeConfig, ProjectConfig};

/// Error during project initialization
#[derive(Debug)]
pub enum InitError {
    /// The directory already holds an aseforge.toml
    ConfigExists(PathBuf),
    /// Failed to create directory
    CreateDir(std::io::Error),
    /// Failed to write file
    WriteFile(std::io::Error),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::ConfigExists(path) => write!(f, "Config already exists: {}", path.display()),
            InitError::CreateDir(e) => write!(f, "Failed to create directory: {}", e),
            InitError::WriteFile(e) => write!(f, "Failed to write file: {}", e),
        }
    }
}

impl std::error::Error for InitError {}

/// Initialize an aseforge project in `path`.
///
/// Existing assets and scripts in the directory are left alone; only an
/// existing `aseforge.toml` makes this fail.
///
/// # Example
/// ```ignore
/// init_project(Path::new("my-character"), "my-character")?;
/// ```
pub fn init_project(path: &Path, name: &str) -> Result<AseforgeConfig, InitError> {
    let config_path = path.join(CONFIG_FILENAME);
    if config_path.exists() {
        return Err(InitError::ConfigExists(config_path));
    }

    let config = AseforgeConfig {
        project: ProjectConfig { name: name.to_string(), ..ProjectConfig::default() },
        ..AseforgeConfig::default()
    };

    create_dir(path)?;
    for dir in [&config.project.anims, &config.project.sprites, &config.project.scripts, &config.project.inject] {
        create_dir(&path.join(dir))?;
    }

    write_file(&config_path, &render_config(&config))?;

    let gitignore = path.join(".gitignore");
    if !gitignore.exists() {
        write_file(&gitignore, &generate_gitignore())?;
    }

    Ok(config)
}

/// Create a directory and all parent directories.
fn create_dir(path: &Path) -> Result<(), InitError> {
    fs::create_dir_all(path).map_err(InitError::CreateDir)
}

/// Write content to a file.
fn write_file(path: &Path, content: &str) -> Result<(), InitError> {
    fs::write(path, content).map_err(InitError::WriteFile)
}

/// Generate .gitignore content.
fn generate_gitignore() -> String {
    format!(
        r#"# aseforge build state
{}

# OS files
.DS_Store
Thumbs.db
"#,
        STATE_FILENAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_structure() {
        let temp = TempDir::new().unwrap();
        let project_path = temp.path().join("hero");

        init_project(&project_path, "hero").unwrap();

        assert!(project_path.join("anims").is_dir());
        assert!(project_path.join("sprites").is_dir());
        assert!(project_path.join("scripts").is_dir());
        assert!(project_path.join("inject").is_dir());
        assert!(project_path.join("aseforge.toml").is_file());
        let gitignore = fs::read_to_string(project_path.join(".gitignore")).unwrap();
        assert!(gitignore.contains(".aseforge-state.json"));
    }

    #[test]
    fn test_init_config_loads_back() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "hero").unwrap();

        let config = load_config(Some(&temp.path().join("aseforge.toml"))).unwrap();
        assert_eq!(config.project.name, "hero");
        assert!(config.is_valid());
    }

    #[test]
    fn test_init_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("anims")).unwrap();
        fs::write(temp.path().join("anims/idle.ase"), b"x").unwrap();
        fs::write(temp.path().join(".gitignore"), "target/\n").unwrap();

        init_project(temp.path(), "hero").unwrap();

        assert!(temp.path().join("anims/idle.ase").exists());
        assert_eq!(fs::read_to_string(temp.path().join(".gitignore")).unwrap(), "target/\n");
    }

    #[test]
    fn test_init_refuses_existing_config() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "hero").unwrap();

        let err = init_project(temp.path(), "hero").unwrap_err();
        assert!(matches!(err, InitError::ConfigExists(_)));
    }
}
