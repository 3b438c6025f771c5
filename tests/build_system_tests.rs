//! Build System Test Suite
//!
//! Integration tests for the incremental build: asset export decisions,
//! per-animation failure isolation, fragment injection and invalidation, and
//! state persistence across runs.
//!
//! Assets here are JSON documents read by a fake parser, and exports go to a
//! recording fake exporter, so no Aseprite install is needed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use aseforge::aseprite::{AssetData, AssetParser, CorruptAssetError, TagRange};
use aseforge::build::{BuildContext, BuildResult, BuildState, IncrementalBuild, UnitKind, UnitStatus};
use aseforge::color::parse_tag_color;
use aseforge::config::default_config;
use aseforge::export::{ExportError, ExportRequest, Exporter};
use aseforge::injection::{SECTION_END, SECTION_START};

// ============================================================================
// Test Utilities
// ============================================================================

/// Parses `{"num_frames": n, "tags": [[name, start, end, color]], "frames": [[bytes]]}`.
struct JsonParser;

impl AssetParser for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<AssetData, CorruptAssetError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|_| CorruptAssetError::BadMagic(0))?;
        let tags = value["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .map(|t| {
                        TagRange::new(
                            t[0].as_str().unwrap(),
                            t[1].as_i64().unwrap() as i32,
                            t[2].as_i64().unwrap() as i32,
                            parse_tag_color(t[3].as_str().unwrap()).unwrap(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let frames: Vec<Vec<u8>> = value["frames"]
            .as_array()
            .map(|frames| {
                frames
                    .iter()
                    .map(|f| f.as_array().unwrap().iter().map(|b| b.as_u64().unwrap() as u8).collect())
                    .collect()
            })
            .unwrap_or_default();
        let num_frames = value["num_frames"].as_u64().map(|n| n as usize).unwrap_or(frames.len());
        Ok(AssetData { num_frames, tags, frames, shared: vec![] })
    }
}

/// Records requests and writes a placeholder strip; fails strips whose base
/// name is listed in `failing`. Each export takes `delay`.
#[derive(Clone, Default)]
struct FakeExporter {
    requests: Arc<Mutex<Vec<ExportRequest>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    delay: Duration,
}

impl FakeExporter {
    fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    fn failing(names: &[&str]) -> Self {
        let exporter = Self::default();
        exporter.failing.lock().unwrap().extend(names.iter().map(|n| n.to_string()));
        exporter
    }

    fn exported(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.destination.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl Exporter for FakeExporter {
    fn export(&self, request: &ExportRequest) -> Result<(), ExportError> {
        std::thread::sleep(self.delay);
        let file_name = request.destination.file_name().unwrap().to_string_lossy().into_owned();
        let base = file_name.split("_strip").next().unwrap().to_string();
        if self.failing.lock().unwrap().contains(&base) {
            return Err(ExportError::Io(std::io::Error::other(format!("cannot export {}", base))));
        }
        fs::create_dir_all(request.destination.parent().unwrap())?;
        fs::write(&request.destination, b"png")?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct Project {
    temp: TempDir,
}

impl Project {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        for dir in ["anims", "sprites", "scripts", "inject"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Rewrite a file and stamp it with the current time, after the last run
    /// started.
    fn edit(&self, rel: &str, content: &str) {
        let path = self.write(rel, content);
        set_mtime(&path, SystemTime::now());
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    fn context(&self) -> BuildContext {
        self.context_with_jobs(4)
    }

    fn context_with_jobs(&self, jobs: usize) -> BuildContext {
        let mut config = default_config();
        config.tags.animation_colors = vec!["red".into()];
        config.tags.window_colors = vec!["blue".into()];
        config.export.jobs = jobs;
        BuildContext::new(config, self.root().to_path_buf())
    }

    fn run_with(&self, ctx: BuildContext, exporter: &FakeExporter) -> BuildResult {
        IncrementalBuild::new(ctx).with_parser(JsonParser).with_exporter(exporter.clone()).run().unwrap()
    }

    fn run(&self, exporter: &FakeExporter) -> BuildResult {
        self.run_with(self.context(), exporter)
    }

    fn state(&self) -> BuildState {
        BuildState::load_from_dir(self.root()).unwrap().unwrap()
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// Asset JSON with three red animations over six frames.
fn fighter(jump_pixel: u8) -> String {
    format!(
        r#"{{"tags": [["idle", 0, 1, "red"], ["run", 2, 3, "red"], ["jump", 4, 5, "red"]],
            "frames": [[1], [2], [3], [4], [5], [{}]]}}"#,
        jump_pixel
    )
}

fn statuses(result: &BuildResult) -> Vec<(String, UnitStatus)> {
    let mut out: Vec<_> = result.units.iter().map(|u| (u.unit_id(), u.status.clone())).collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

const COMBO_LIB: &str = "#define combo_lib(count)\n    return count * 2;\n";

// ============================================================================
// Asset Export
// ============================================================================

#[test]
fn test_end_to_end_run_with_hitbox() {
    let project = Project::new();
    project.write(
        "anims/A.ase",
        r#"{"tags": [["run", 0, 3, "red"], ["hitbox", 1, 2, "blue"]], "frames": [[1], [2], [3], [4]]}"#,
    );
    let exporter = FakeExporter::default();

    let result = project.run(&exporter);

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.exported_count(), 1);
    let requests = exporter.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!((requests[0].start, requests[0].end, requests[0].scale), (0, 3, 1));
    assert_eq!(requests[0].destination, project.path("sprites/run_strip4.png"));
    assert_eq!(requests[0].source, project.path("anims/A.ase"));

    let state = project.state();
    assert!(state.seen_paths.contains(Path::new("anims/A.ase")));
    assert!(state.anim_hashes.get(Path::new("anims/A.ase"), "run").is_some());
}

#[test]
fn test_untouched_project_is_noop() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    let exporter = FakeExporter::default();
    project.run(&exporter);
    exporter.clear();

    let result = project.run(&exporter);

    assert!(result.units.is_empty(), "{}", result.summary());
    assert!(exporter.exported().is_empty());
}

#[test]
fn test_only_changed_animation_reexported() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    let exporter = FakeExporter::default();
    project.run(&exporter);
    exporter.clear();

    project.edit("anims/fighter.ase", &fighter(60));
    let result = project.run(&exporter);

    assert_eq!(exporter.exported(), vec!["jump_strip2.png"]);
    assert_eq!(
        statuses(&result),
        vec![
            ("anims/fighter.ase#idle".to_string(), UnitStatus::Skipped),
            ("anims/fighter.ase#jump".to_string(), UnitStatus::Exported),
            ("anims/fighter.ase#run".to_string(), UnitStatus::Skipped),
        ]
    );
}

#[test]
fn test_touched_but_identical_exports_nothing() {
    let project = Project::new();
    project.write("anims/player.ase", r#"{"tags": [["idle", 0, 1, "red"]], "frames": [[1], [2]]}"#);
    let exporter = FakeExporter::default();
    project.run(&exporter);
    exporter.clear();

    project.edit("anims/player.ase", r#"{"tags": [["idle", 0, 1, "red"]], "frames": [[1], [2]]}"#);
    let result = project.run(&exporter);

    assert!(exporter.exported().is_empty());
    assert_eq!(result.skipped_count(), 1);
    assert!(project.state().seen_paths.contains(Path::new("anims/player.ase")));
}

#[test]
fn test_untagged_asset_exports_whole_file() {
    let project = Project::new();
    project.write("anims/walls/torch.ase", r#"{"tags": [], "frames": [[1], [2], [3], [4], [5]]}"#);
    let exporter = FakeExporter::default();

    project.run(&exporter);

    assert_eq!(exporter.exported(), vec!["walls_torch_strip5.png"]);
}

#[test]
fn test_old_strips_removed_on_reexport() {
    let project = Project::new();
    project.write("anims/player.ase", r#"{"tags": [["idle", 0, 1, "red"]], "frames": [[1], [2]]}"#);
    let exporter = FakeExporter::default();
    project.run(&exporter);
    assert!(project.path("sprites/idle_strip2.png").exists());

    project.edit("anims/player.ase", r#"{"tags": [["idle", 0, 2, "red"]], "frames": [[1], [2], [3]]}"#);
    project.run(&exporter);

    assert!(!project.path("sprites/idle_strip2.png").exists());
    assert!(project.path("sprites/idle_strip3.png").exists());
}

// ============================================================================
// Failure Isolation
// ============================================================================

#[test]
fn test_failed_animation_does_not_block_siblings() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    let exporter = FakeExporter::failing(&["run"]);

    let result = project.run(&exporter);

    assert!(!result.is_success());
    assert_eq!(result.exported_count(), 2);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.failures()[0].unit_id(), "anims/fighter.ase#run");
    assert_eq!(exporter.exported(), vec!["idle_strip2.png", "jump_strip2.png"]);

    let state = project.state();
    let asset = Path::new("anims/fighter.ase");
    assert!(!state.seen_paths.contains(asset));
    assert!(state.anim_hashes.get(asset, "idle").is_some());
    assert!(state.anim_hashes.get(asset, "run").is_none());
}

#[test]
fn test_failed_unit_retried_next_run() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    project.run(&FakeExporter::failing(&["run"]));

    let exporter = FakeExporter::default();
    let result = project.run(&exporter);

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(exporter.exported(), vec!["run_strip2.png"]);
    assert!(project.state().seen_paths.contains(Path::new("anims/fighter.ase")));

    exporter.clear();
    assert!(project.run(&exporter).units.is_empty());
}

#[test]
fn test_corrupt_asset_isolated() {
    let project = Project::new();
    project.write("anims/broken.ase", "not json");
    project.write("anims/player.ase", r#"{"tags": [["idle", 0, 1, "red"]], "frames": [[1], [2]]}"#);
    let exporter = FakeExporter::default();

    let result = project.run(&exporter);

    assert_eq!(result.exported_count(), 1);
    assert_eq!(result.failed_count(), 1);
    assert!(matches!(&result.failures()[0].kind, UnitKind::Asset { asset } if asset == Path::new("anims/broken.ase")));

    let state = project.state();
    assert!(!state.seen_paths.contains(Path::new("anims/broken.ase")));
    assert!(state.seen_paths.contains(Path::new("anims/player.ase")));
}

// ============================================================================
// Injection
// ============================================================================

#[test]
fn test_client_injected_with_used_fragment() {
    let project = Project::new();
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    project.write("scripts/idle.gml", "var still = true;\n");
    let exporter = FakeExporter::default();

    let result = project.run(&exporter);

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.injected_count(), 1);
    let attack = project.read("scripts/attack.gml");
    assert!(attack.starts_with("var hits = combo_lib(3);\n"));
    assert!(attack.contains(SECTION_START));
    assert!(attack.contains("return count * 2;"));
    assert!(attack.contains(SECTION_END));
    assert_eq!(project.read("scripts/idle.gml"), "var still = true;\n");

    let state = project.state();
    let deps = state.dependencies.dependencies_of(Path::new("scripts/attack.gml")).unwrap();
    assert!(deps.contains(Path::new("inject/combo.gml")));
    assert!(state.dependencies.dependencies_of(Path::new("scripts/idle.gml")).is_none());
    assert!(state.seen_paths.contains(Path::new("inject/combo.gml")));
}

#[test]
fn test_fragment_change_reinjects_dependents() {
    let project = Project::new();
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    project.write("scripts/idle.gml", "var still = true;\n");
    let exporter = FakeExporter::default();
    project.run(&exporter);

    project.edit("inject/combo.gml", "#define combo_lib(count)\n    return count * 5;\n");
    let result = project.run(&exporter);

    assert_eq!(
        statuses(&result),
        vec![("scripts/attack.gml".to_string(), UnitStatus::Injected)]
    );
    let attack = project.read("scripts/attack.gml");
    assert!(attack.contains("return count * 5;"));
    assert!(!attack.contains("return count * 2;"));
}

#[test]
fn test_injected_client_fresh_on_next_run() {
    let project = Project::new();
    project.write("anims/hero.ase", r#"{"tags": [["hero", 0, 1, "red"]], "frames": [[1], [2]]}"#);
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    // The injection lands well after the run started.
    let exporter = FakeExporter::slow(Duration::from_millis(200));
    let ctx = project.context_with_jobs(1);

    let first = project.run_with(ctx.clone(), &exporter);
    assert_eq!(
        statuses(&first),
        vec![
            ("anims/hero.ase#hero".to_string(), UnitStatus::Exported),
            ("scripts/attack.gml".to_string(), UnitStatus::Injected),
        ]
    );

    let second = project.run_with(ctx, &exporter);
    assert!(second.units.is_empty(), "{}", second.summary());
    assert!(project.read("scripts/attack.gml").contains(SECTION_END));
}

#[test]
fn test_reinjection_is_idempotent() {
    let project = Project::new();
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    let exporter = FakeExporter::default();
    project.run(&exporter);
    let first = project.read("scripts/attack.gml");

    let result = project.run_with(project.context().with_force(true), &exporter);

    assert_eq!(result.injected_count(), 0);
    assert_eq!(result.skipped_count(), 1);
    assert_eq!(project.read("scripts/attack.gml"), first);
}

#[test]
fn test_deleted_fragment_file_invalidates_client() {
    let project = Project::new();
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    let exporter = FakeExporter::default();
    project.run(&exporter);

    fs::remove_file(project.path("inject/combo.gml")).unwrap();
    let result = project.run(&exporter);

    assert_eq!(result.injected_count(), 1);
    assert_eq!(project.read("scripts/attack.gml"), "var hits = combo_lib(3);\n");
    assert!(project.state().dependencies.is_empty());
}

#[test]
fn test_no_inject_marker_respected() {
    let project = Project::new();
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/manual.gml", "// NO-INJECT\nvar hits = combo_lib(3);\n");

    project.run(&FakeExporter::default());

    assert_eq!(project.read("scripts/manual.gml"), "// NO-INJECT\nvar hits = combo_lib(3);\n");
}

// ============================================================================
// Modes and State
// ============================================================================

#[test]
fn test_force_reexports_everything() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    let exporter = FakeExporter::default();
    project.run(&exporter);
    exporter.clear();

    let result = project.run_with(project.context().with_force(true), &exporter);

    assert_eq!(result.exported_count(), 3);
    assert_eq!(exporter.exported().len(), 3);
}

#[test]
fn test_dry_run_changes_nothing() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    let exporter = FakeExporter::default();

    let result = project.run_with(project.context().with_dry_run(true), &exporter);

    assert!(result.dry_run);
    assert_eq!(result.planned_count(), 4);
    assert!(exporter.exported().is_empty());
    assert_eq!(project.read("scripts/attack.gml"), "var hits = combo_lib(3);\n");
    assert!(BuildState::load_from_dir(project.root()).unwrap().is_none());
    assert!(result.summary().starts_with("Dry run: 4 units would run"));
}

#[test]
fn test_deleted_asset_and_client_forgotten() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    let exporter = FakeExporter::default();
    project.run(&exporter);

    fs::remove_file(project.path("anims/fighter.ase")).unwrap();
    fs::remove_file(project.path("scripts/attack.gml")).unwrap();
    project.run(&exporter);

    let state = project.state();
    assert!(state.anim_hashes.is_empty());
    assert!(state.dependencies.is_empty());
    assert!(!state.seen_paths.contains(Path::new("anims/fighter.ase")));
    assert!(!state.seen_paths.contains(Path::new("scripts/attack.gml")));
}

#[test]
fn test_state_file_round_trip() {
    let project = Project::new();
    project.write("anims/fighter.ase", &fighter(6));
    project.write("inject/combo.gml", COMBO_LIB);
    project.write("scripts/attack.gml", "var hits = combo_lib(3);\n");
    project.run(&FakeExporter::default());

    let state = project.state();
    let copy = project.path("copy/state.json");
    state.save(&copy).unwrap();

    assert_eq!(BuildState::load(&copy).unwrap().unwrap(), state);
}
