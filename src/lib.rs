//! aseforge - Incremental build tool for Aseprite-based game projects
//!
//! This library provides functionality to:
//! - Parse Aseprite files and decompose their colored tags into animations
//!   and windows
//! - Export each animation as a sprite strip through the Aseprite CLI,
//!   re-exporting only animations whose frames changed
//! - Inject shared library fragments into client scripts and re-inject when a
//!   fragment they use changes

pub mod aseprite;
pub mod build;
pub mod cli;
pub mod color;
pub mod config;
pub mod export;
pub mod init;
pub mod injection;
pub mod logging;
pub mod watch;
