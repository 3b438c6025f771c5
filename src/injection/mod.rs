//! Shared code injection for client scripts
//!
//! Client scripts (`.gml`) call helpers defined once in the inject library.
//! Injection copies the definitions a client uses into a generated section
//! of that client, and reports which library files it drew from so the build
//! can re-inject when one of them changes.
//!
//! # Example
//!
//! ```ignore
//! use aseforge::injection::{inject_file, DirectoryLibrary};
//!
//! let library = DirectoryLibrary::load(Path::new("inject"))?;
//! let injection = inject_file(Path::new("scripts/attacks/jab.gml"), &library)?;
//! println!("depends on {:?}", injection.dependencies);
//! ```

pub mod apply;
pub mod library;

pub use apply::*;
pub use library::*;

use std::path::PathBuf;
use thiserror::Error;

/// Injecting into a client failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InjectionError {
    /// Reading or writing a client or library file failed
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A fragment name is not in the library
    #[error("unknown fragment '{0}'")]
    UnknownFragment(String),
    /// The library could not be loaded
    #[error("invalid inject library: {0}")]
    Library(String),
}
