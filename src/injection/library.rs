//! Injectable fragment library.
//!
//! Library files live under the inject root. A fragment is either a
//! `#define name` block, running until the next directive at the start of a
//! line, or a single `#macro NAME value` line. Text before the first
//! directive of a file is ignored.

use crate::injection::InjectionError;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Kind of library fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragmentKind {
    Macro,
    Define,
}

/// One injectable fragment.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub kind: FragmentKind,
    /// Full source text, directive line included
    pub text: String,
    /// Library file defining the fragment
    pub path: PathBuf,
    usage: Regex,
}

impl Fragment {
    fn new(name: &str, kind: FragmentKind, text: String, path: &Path) -> Result<Self, regex::Error> {
        let usage = Regex::new(&format!(r"\b{}\b", regex::escape(name)))?;
        Ok(Self { name: name.to_string(), kind, text, path: path.to_path_buf(), usage })
    }

    /// Whether `source` refers to this fragment by name.
    pub fn is_used_by(&self, source: &str) -> bool {
        self.usage.is_match(source)
    }
}

/// Source of injectable fragments.
pub trait FragmentLibrary: Send + Sync {
    /// Source text of a fragment.
    fn load_fragment(&self, name: &str) -> Result<&str, InjectionError>;

    /// Fragments a client needs, including fragments those fragments use.
    ///
    /// Fragments the client defines itself are never returned.
    fn resolve_dependencies(&self, client_source: &str) -> BTreeSet<String>;

    /// The library file that defines a fragment.
    fn fragment_path(&self, name: &str) -> Option<&Path>;

    /// Fragment kind, used to order the generated section.
    fn fragment_kind(&self, name: &str) -> Option<FragmentKind>;
}

/// Library loaded from the files of an inject directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLibrary {
    fragments: BTreeMap<String, Fragment>,
}

impl DirectoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.gml` file under `dir`. A missing directory is an empty
    /// library.
    pub fn load(dir: &Path) -> Result<Self, InjectionError> {
        let mut library = Self::new();
        if !dir.is_dir() {
            return Ok(library);
        }

        let pattern = dir.join("**").join("*.gml").to_string_lossy().into_owned();
        let entries = glob::glob(&pattern)
            .map_err(|e| InjectionError::Library(format!("bad inject path {}: {}", pattern, e)))?;
        let mut files: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
        files.sort();

        for file in files {
            let text = fs::read_to_string(&file)
                .map_err(|source| InjectionError::Io { path: file.clone(), source })?;
            library.add_source(&file, &text)?;
        }
        Ok(library)
    }

    /// Parse fragments out of `text` as if it were the file `path`.
    ///
    /// The first definition of a name wins; later ones are ignored with a
    /// warning.
    pub fn add_source(&mut self, path: &Path, text: &str) -> Result<(), InjectionError> {
        for (name, kind, body) in parse_fragments(text) {
            if let Some(existing) = self.fragments.get(&name) {
                warn!(
                    fragment = %name,
                    kept = %existing.path.display(),
                    ignored = %path.display(),
                    "duplicate fragment definition"
                );
                continue;
            }
            let fragment = Fragment::new(&name, kind, body, path)
                .map_err(|e| InjectionError::Library(e.to_string()))?;
            self.fragments.insert(name, fragment);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl FragmentLibrary for DirectoryLibrary {
    fn load_fragment(&self, name: &str) -> Result<&str, InjectionError> {
        self.fragments
            .get(name)
            .map(|f| f.text.as_str())
            .ok_or_else(|| InjectionError::UnknownFragment(name.to_string()))
    }

    fn resolve_dependencies(&self, client_source: &str) -> BTreeSet<String> {
        let own: BTreeSet<String> =
            parse_fragments(client_source).into_iter().map(|(name, _, _)| name).collect();

        let mut needed = BTreeSet::new();
        let mut pending: Vec<&str> = vec![client_source];
        while let Some(source) = pending.pop() {
            for fragment in self.fragments.values() {
                if own.contains(&fragment.name) || needed.contains(&fragment.name) {
                    continue;
                }
                if fragment.is_used_by(source) {
                    needed.insert(fragment.name.clone());
                    pending.push(&fragment.text);
                }
            }
        }
        needed
    }

    fn fragment_path(&self, name: &str) -> Option<&Path> {
        self.fragments.get(name).map(|f| f.path.as_path())
    }

    fn fragment_kind(&self, name: &str) -> Option<FragmentKind> {
        self.fragments.get(name).map(|f| f.kind)
    }
}

/// Split source text into `(name, kind, text)` fragments.
pub fn parse_fragments(text: &str) -> Vec<(String, FragmentKind, String)> {
    let mut fragments = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("#define") {
            flush_define(&mut current, &mut fragments);
            if let Some(name) = leading_identifier(rest) {
                current = Some((name.to_string(), vec![line]));
            }
        } else if let Some(rest) = line.strip_prefix("#macro") {
            flush_define(&mut current, &mut fragments);
            if let Some(name) = leading_identifier(rest) {
                fragments.push((name.to_string(), FragmentKind::Macro, line.trim_end().to_string()));
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    flush_define(&mut current, &mut fragments);

    fragments
}

fn flush_define(
    current: &mut Option<(String, Vec<&str>)>,
    fragments: &mut Vec<(String, FragmentKind, String)>,
) {
    if let Some((name, lines)) = current.take() {
        let text = lines.join("\n").trim_end().to_string();
        fragments.push((name, FragmentKind::Define, text));
    }
}

/// The identifier following a directive keyword, which must be separated
/// from it by whitespace.
fn leading_identifier(rest: &str) -> Option<&str> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        None
    } else {
        Some(name)
    }
}
