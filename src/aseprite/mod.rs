//! Aseprite asset handling
//!
//! - [`parser`]: reads frame count, tags and per-frame pixel chunks from the
//!   `.ase`/`.aseprite` binary format
//! - [`decompose`]: turns colored tags into named animations and their windows

pub mod decompose;
pub mod parser;

pub use decompose::*;
pub use parser::*;
