//! Inspect command: show how an asset's tags decompose.

use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

use super::build::load_project;
use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::aseprite::{decompose, AsepriteParser, AssetParser, Window};
use crate::build::{fingerprint_frames, is_asset_file};
use crate::config::TagColorSets;

/// One animation as printed by `aseforge inspect`.
#[derive(Debug, Serialize)]
pub struct AnimationReport {
    pub name: String,
    pub start: i32,
    pub end: i32,
    pub frames: usize,
    pub windows: Vec<Window>,
    pub fingerprint: String,
}

/// Everything `inspect` prints for one file.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub num_frames: usize,
    pub animations: Vec<AnimationReport>,
}

/// Parse and decompose one asset.
pub fn inspect_bytes(
    file: &Path,
    bytes: &[u8],
    parser: &dyn AssetParser,
    colors: &TagColorSets,
) -> Result<InspectReport, String> {
    let data = parser.parse(bytes).map_err(|e| e.to_string())?;
    let file_name = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

    let animations = decompose(&data.tags, &colors.animation, &colors.window, data.num_frames, &file_name)
        .into_iter()
        .map(|anim| AnimationReport {
            frames: anim.frame_count(),
            fingerprint: fingerprint_frames(&data.shared, data.frame_range(anim.start, anim.end)),
            name: anim.name,
            start: anim.start,
            end: anim.end,
            windows: anim.windows,
        })
        .collect();

    Ok(InspectReport { file: file.display().to_string(), num_frames: data.num_frames, animations })
}

/// Run the inspect command
pub fn run_inspect(file: &Path) -> ExitCode {
    if !is_asset_file(file) {
        eprintln!("Error: {} is not an .ase or .aseprite file", file.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let colors = match load_project() {
        Ok((config, _)) => match config.tag_colors() {
            Ok(colors) => colors,
            Err(errors) => {
                for e in errors {
                    eprintln!("Error: {}", e);
                }
                return ExitCode::from(EXIT_ERROR);
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", file.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match inspect_bytes(file, &bytes, &AsepriteParser, &colors) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        },
        Err(e) => {
            eprintln!("Error: {}: {}", file.display(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
