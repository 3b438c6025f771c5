//! Configuration module for the aseforge build
//!
//! Provides types and parsing for `aseforge.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::*;
