//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod inspect;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::logging::init_logging;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// aseforge - Incremental sprite strip export and script injection for Aseprite projects
#[derive(Parser)]
#[command(name = "aseforge")]
#[command(about = "aseforge - Export tagged Aseprite animations to sprite strips and inject shared script fragments")]
#[command(version)]
pub struct Cli {
    /// Log level (overrides ASEFORGE_LOG)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    /// Level to log at; an explicit `--log-level` wins over `--verbose`.
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        self.log_level.or(if self.verbose { Some(LogLevel::Debug) } else { None })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export stale animations and re-inject stale client scripts
    Build {
        /// Watch for changes and rebuild automatically
        #[arg(short, long)]
        watch: bool,

        /// Dry run (show what would be done without doing it)
        #[arg(long)]
        dry_run: bool,

        /// Ignore saved state and redo everything
        #[arg(short, long)]
        force: bool,

        /// Number of parallel export/injection workers (0 = all cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Path to the Aseprite executable
        #[arg(long)]
        aseprite: Option<PathBuf>,

        /// Export at 2x scale
        #[arg(long)]
        small_sprites: bool,
    },

    /// Print the animations and windows of an asset as JSON
    Inspect {
        /// Asset file (.ase or .aseprite)
        file: PathBuf,
    },

    /// Initialize a new aseforge project
    Init {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,

        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// Parse arguments, set up logging and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.effective_log_level());

    match cli.command {
        Commands::Build { watch, dry_run, force, jobs, aseprite, small_sprites } => {
            let options = build::BuildOptions {
                watch,
                dry_run,
                force,
                jobs,
                aseprite,
                small_sprites,
                verbose: cli.verbose,
            };
            build::run_build(&options)
        }
        Commands::Inspect { file } => inspect::run_inspect(&file),
        Commands::Init { path, name } => build::run_init(path.as_deref(), name.as_deref()),
    }
}
