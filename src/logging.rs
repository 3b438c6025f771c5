//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (or `--verbose`, meaning `debug`)
//! 2. `ASEFORGE_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs go to STDERR; stdout carries build summaries and `inspect` JSON.

use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no level flag is given.
pub const LOG_ENV: &str = "ASEFORGE_LOG";

/// Install the global subscriber.
///
/// Only the first call in a process takes effect.
pub fn init_logging(cli_level: Option<LogLevel>) {
    let level = resolve_level(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    let _ = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_level(cli_level: Option<LogLevel>, env: Option<&str>) -> tracing::Level {
    match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => env.and_then(parse_level_str).unwrap_or(tracing::Level::INFO),
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_flag_beats_env() {
        assert_eq!(resolve_level(Some(LogLevel::Warn), Some("trace")), Level::WARN);
    }

    #[test]
    fn test_env_then_default() {
        assert_eq!(resolve_level(None, Some(" Debug ")), Level::DEBUG);
        assert_eq!(resolve_level(None, Some("warning")), Level::WARN);
        assert_eq!(resolve_level(None, Some("loud")), Level::INFO);
        assert_eq!(resolve_level(None, None), Level::INFO);
    }
}
