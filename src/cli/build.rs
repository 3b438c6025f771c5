//! Build command implementations (build, init)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::debug;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::config::AseforgeConfig;

/// Flags of `aseforge build`.
#[derive(Debug, Default)]
pub struct BuildOptions {
    pub watch: bool,
    pub dry_run: bool,
    pub force: bool,
    pub jobs: Option<usize>,
    pub aseprite: Option<PathBuf>,
    pub small_sprites: bool,
    pub verbose: bool,
}

/// Locate and load the project config.
///
/// Returns the config and the project root (the config's directory, or the
/// current directory when there is no config).
pub(crate) fn load_project() -> Result<(AseforgeConfig, PathBuf), String> {
    use crate::config::loader::{default_config, find_config, load_config};

    match find_config() {
        Some(config_path) => {
            debug!(config = %config_path.display(), "using config");
            let cfg = load_config(Some(&config_path)).map_err(|e| format!("Error loading config: {}", e))?;
            let root = config_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            Ok((cfg, root))
        }
        None => {
            debug!("no aseforge.toml found, using defaults");
            Ok((default_config(), std::env::current_dir().unwrap_or_default()))
        }
    }
}

/// Run the build command
pub fn run_build(options: &BuildOptions) -> ExitCode {
    use crate::build::{BuildContext, IncrementalBuild};
    use crate::config::loader::{merge_cli_overrides, CliOverrides};

    let (mut config, project_root) = match load_project() {
        Ok(project) => project,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // Apply CLI overrides to config
    let overrides = CliOverrides {
        aseprite_path: options.aseprite.clone(),
        jobs: options.jobs,
        small_sprites: options.small_sprites.then_some(true),
    };
    merge_cli_overrides(&mut config, &overrides);

    let context = BuildContext::new(config, project_root)
        .with_force(options.force)
        .with_dry_run(options.dry_run)
        .with_verbose(options.verbose);

    if !context.anims_dir().exists() && !context.scripts_dir().exists() {
        eprintln!("Error: Neither {} nor {} exists", context.anims_dir().display(), context.scripts_dir().display());
        eprintln!("Run 'aseforge init' or adjust [project] in aseforge.toml");
        return ExitCode::from(EXIT_ERROR);
    }

    // Watch mode
    if options.watch && !options.dry_run {
        println!("Starting watch mode...");
        if options.force {
            println!("Force mode: first build ignores saved state");
        }
        println!("Press Ctrl+C to stop");
        println!();

        return match crate::watch::watch_and_rebuild(context) {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    if options.force {
        println!("Building (force rebuild, ignoring state)...");
    } else if !options.dry_run {
        println!("Building (incremental)...");
    }

    match IncrementalBuild::new(context).run() {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                ExitCode::from(EXIT_SUCCESS)
            } else {
                eprintln!("{}", result.summary());
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => {
            eprintln!("Build error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the init command
pub fn run_init(path: Option<&Path>, name: Option<&str>) -> ExitCode {
    use crate::init::{init_project, InitError};

    // Determine project path
    let project_path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    // Determine project name
    let project_name = name
        .map(|n| n.to_string())
        .or_else(|| project_path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "my-character".to_string());

    match init_project(&project_path, &project_name) {
        Ok(config) => {
            println!("Created aseforge project '{}' at {}", project_name, project_path.display());
            println!();
            println!("Project structure:");
            println!("  {}/", project_path.display());
            println!("  ├── aseforge.toml");
            println!("  ├── {}/", config.project.anims.display());
            println!("  ├── {}/", config.project.sprites.display());
            println!("  ├── {}/", config.project.scripts.display());
            println!("  └── {}/", config.project.inject.display());
            println!();
            println!("Next steps:");
            println!("  put tagged .aseprite files in {}/", config.project.anims.display());
            println!("  aseforge build");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(InitError::ConfigExists(path)) => {
            eprintln!("Error: {} already exists", path.display());
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
