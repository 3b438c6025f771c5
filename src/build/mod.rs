//! Incremental build system for aseforge
//!
//! Turns tagged Aseprite assets into sprite strips and keeps client scripts'
//! injected library sections current, redoing only what changed since the
//! last run.
//!
//! # Overview
//!
//! The build consists of:
//! - **Discovery**: Find assets, client scripts and library files
//! - **Planning**: Decide per asset, animation and client what is stale
//! - **Execution**: Run export and injection units on a worker pool
//! - **State**: Persist what was seen and exported for the next run
//!
//! # Example
//!
//! ```ignore
//! use aseforge::build::{BuildContext, IncrementalBuild};
//! use aseforge::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//!
//! let result = IncrementalBuild::new(context).run()?;
//! println!("Exported {} animations", result.exported_count());
//! ```

pub mod anim_cache;
pub mod context;
pub mod deps;
pub mod discovery;
pub mod freshness;
pub mod incremental;
pub mod parallel;
pub mod plan;
pub mod result;
pub mod state;

pub use anim_cache::*;
pub use context::*;
pub use deps::*;
pub use discovery::*;
pub use freshness::*;
pub use incremental::*;
pub use parallel::*;
pub use plan::*;
pub use result::*;
pub use state::*;
