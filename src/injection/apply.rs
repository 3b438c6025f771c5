//! Writing library fragments into client scripts.
//!
//! Injected code goes in one generated section at the end of the script. The
//! section is rebuilt from scratch every time, so removing the last use of a
//! fragment removes its code too.

use crate::injection::{FragmentKind, FragmentLibrary, InjectionError};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const SECTION_START: &str = "// vvv LIBRARY DEFINES AND MACROS vvv";
pub const SECTION_END: &str = "// ^^^ END: LIBRARY DEFINES AND MACROS ^^^";
const SECTION_WARNING: &str =
    "// DANGER: Generated by aseforge. Changes below this line are overwritten.";

/// Clients containing this marker are left untouched.
pub const NO_INJECT_MARKER: &str = "NO-INJECT";

/// Outcome of injecting into one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// New client text
    pub text: String,
    /// Fragments written into the section
    pub fragments: BTreeSet<String>,
    /// Library files defining those fragments
    pub dependencies: BTreeSet<PathBuf>,
    /// Whether `text` differs from the input
    pub changed: bool,
}

/// The client text with any generated section removed.
pub fn strip_generated(source: &str) -> &str {
    match find_section_start(source) {
        Some(idx) => &source[..idx],
        None => source,
    }
}

fn find_section_start(source: &str) -> Option<usize> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        if line.trim_end() == SECTION_START {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Render the generated section for `names`: macros first, then defines,
/// each group sorted by name.
pub fn render_section(
    library: &dyn FragmentLibrary,
    names: &BTreeSet<String>,
) -> Result<String, InjectionError> {
    let mut ordered: Vec<(FragmentKind, &str)> = names
        .iter()
        .map(|name| {
            library
                .fragment_kind(name)
                .map(|kind| (kind, name.as_str()))
                .ok_or_else(|| InjectionError::UnknownFragment(name.clone()))
        })
        .collect::<Result<_, _>>()?;
    ordered.sort();

    let mut section = String::new();
    section.push_str(SECTION_START);
    section.push('\n');
    section.push_str(SECTION_WARNING);
    section.push('\n');
    for (i, (kind, name)) in ordered.iter().enumerate() {
        if i > 0 && (*kind == FragmentKind::Define || ordered[i - 1].0 != *kind) {
            section.push('\n');
        }
        section.push_str(library.load_fragment(name)?);
        section.push('\n');
    }
    section.push_str(SECTION_END);
    section.push('\n');
    Ok(section)
}

/// Compute the injected form of `source`.
pub fn inject(source: &str, library: &dyn FragmentLibrary) -> Result<Injection, InjectionError> {
    if source.contains(NO_INJECT_MARKER) {
        return Ok(Injection {
            text: source.to_string(),
            fragments: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            changed: false,
        });
    }

    let body = strip_generated(source);
    let fragments = library.resolve_dependencies(body);

    let text = if fragments.is_empty() {
        if body.len() == source.len() {
            source.to_string()
        } else {
            format!("{}\n", body.trim_end())
        }
    } else {
        let body = body.trim_end();
        let section = render_section(library, &fragments)?;
        if body.is_empty() {
            section
        } else {
            format!("{}\n\n{}", body, section)
        }
    };

    let dependencies = fragments
        .iter()
        .filter_map(|name| library.fragment_path(name).map(Path::to_path_buf))
        .collect();

    Ok(Injection { changed: text != source, text, fragments, dependencies })
}

/// Inject into a client file, rewriting it only when the text changes.
pub fn inject_file(path: &Path, library: &dyn FragmentLibrary) -> Result<Injection, InjectionError> {
    let source = fs::read_to_string(path)
        .map_err(|source| InjectionError::Io { path: path.to_path_buf(), source })?;
    let injection = inject(&source, library)?;
    if injection.changed {
        fs::write(path, &injection.text)
            .map_err(|source| InjectionError::Io { path: path.to_path_buf(), source })?;
    }
    Ok(injection)
}
