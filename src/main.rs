//! aseforge - Command-line tool for incremental sprite export and script injection

use std::process::ExitCode;

use aseforge::cli;

fn main() -> ExitCode {
    cli::run()
}
