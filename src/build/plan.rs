//! Build planning.
//!
//! Planning decides what a run will do without doing any of it: it reads
//! and parses stale assets, decomposes their tags, fingerprints every
//! animation and picks the animations to export. It only reads the loaded
//! state, so assets are planned in parallel with rayon.

use crate::aseprite::{decompose, Animation, AssetParser, CorruptAssetError};
use crate::build::{fingerprint_frames, BuildState, TrackedFile};
use crate::config::TagColorSets;
use crate::export::{sprite_base_name, strip_path, ExportRequest};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Why an asset could not be planned.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt asset: {0}")]
    Corrupt(#[from] CorruptAssetError),
}

/// One animation export.
#[derive(Debug, Clone)]
pub struct ExportUnit {
    /// State key of the asset
    pub asset: PathBuf,
    /// The animation, carrying its fingerprint
    pub animation: Animation,
    /// Strip base name, used to clear earlier strips
    pub base_name: String,
    pub request: ExportRequest,
}

/// Planned work for one stale asset.
#[derive(Debug, Clone)]
pub struct AssetWork {
    /// State key of the asset
    pub key: PathBuf,
    /// Every animation in the asset, fingerprinted
    pub animations: Vec<Animation>,
    /// Animations to export
    pub exports: Vec<ExportUnit>,
}

impl AssetWork {
    /// Animations whose fingerprint matches the recorded one.
    pub fn skipped(&self) -> impl Iterator<Item = &Animation> {
        let exporting: BTreeSet<&str> =
            self.exports.iter().map(|u| u.animation.name.as_str()).collect();
        self.animations.iter().filter(move |a| !exporting.contains(a.name.as_str()))
    }
}

/// What happens to one asset this run.
#[derive(Debug)]
pub enum AssetPlan {
    /// Fresh; not reprocessed
    Fresh { key: PathBuf },
    /// Stale and parsed
    Stale(AssetWork),
    /// Stale but unreadable or corrupt
    Failed { key: PathBuf, error: PlanError },
}

impl AssetPlan {
    pub fn key(&self) -> &Path {
        match self {
            AssetPlan::Fresh { key } | AssetPlan::Failed { key, .. } => key,
            AssetPlan::Stale(work) => &work.key,
        }
    }
}

/// Plans assets against a loaded state snapshot.
pub struct AssetPlanner<'a> {
    parser: &'a dyn AssetParser,
    colors: &'a TagColorSets,
    state: &'a BuildState,
    anims_dir: PathBuf,
    sprites_dir: PathBuf,
    scale: u32,
    force: bool,
}

impl<'a> AssetPlanner<'a> {
    pub fn new(
        parser: &'a dyn AssetParser,
        colors: &'a TagColorSets,
        state: &'a BuildState,
        anims_dir: PathBuf,
        sprites_dir: PathBuf,
    ) -> Self {
        Self { parser, colors, state, anims_dir, sprites_dir, scale: 1, force: false }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Treat every asset and every animation as changed.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Plan every asset, in parallel. `key_of` maps a discovered path to
    /// its state key.
    pub fn plan_all<K>(&self, assets: &[TrackedFile], key_of: K) -> Vec<AssetPlan>
    where
        K: Fn(&Path) -> PathBuf + Sync,
    {
        assets.par_iter().map(|file| self.plan(file, key_of(&file.path))).collect()
    }

    /// Plan a single asset.
    pub fn plan(&self, file: &TrackedFile, key: PathBuf) -> AssetPlan {
        let freshness = self.state.freshness().with_force(self.force);
        if !freshness.is_stale(&key, file.modified) {
            debug!(asset = %key.display(), "fresh");
            return AssetPlan::Fresh { key };
        }

        match self.plan_stale(&file.path, &key) {
            Ok(work) => AssetPlan::Stale(work),
            Err(error) => AssetPlan::Failed { key, error },
        }
    }

    fn plan_stale(&self, path: &Path, key: &Path) -> Result<AssetWork, PlanError> {
        let bytes = fs::read(path)?;
        let data = self.parser.parse(&bytes)?;

        let file_name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let animations: Vec<Animation> =
            decompose(&data.tags, &self.colors.animation, &self.colors.window, data.num_frames, &file_name)
                .into_iter()
                .map(|anim| {
                    let hash = fingerprint_frames(&data.shared, data.frame_range(anim.start, anim.end));
                    anim.with_hash(hash)
                })
                .collect();
        let animations = first_of_each_name(key, animations);

        // Nothing recorded means the asset was never exported.
        let export_all = self.force || !self.state.anim_hashes.has_asset(key);

        let exports = animations
            .iter()
            .filter(|anim| export_all || self.state.anim_hashes.needs_export(key, anim))
            .map(|anim| self.export_unit(path, key, anim))
            .collect();

        let work = AssetWork { key: key.to_path_buf(), animations, exports };
        debug!(
            asset = %key.display(),
            animations = work.animations.len(),
            exports = work.exports.len(),
            "planned"
        );
        Ok(work)
    }

    fn export_unit(&self, path: &Path, key: &Path, anim: &Animation) -> ExportUnit {
        let base_name = sprite_base_name(&self.anims_dir, path, &anim.name);
        let destination = strip_path(&self.sprites_dir, &base_name, anim.frame_count());
        ExportUnit {
            asset: key.to_path_buf(),
            animation: anim.clone(),
            base_name,
            request: ExportRequest {
                source: path.to_path_buf(),
                start: anim.start,
                end: anim.end,
                scale: self.scale,
                destination,
            },
        }
    }
}

/// Drop animations reusing an earlier animation's name. Both would export
/// to the same strip and share one fingerprint entry.
fn first_of_each_name(key: &Path, animations: Vec<Animation>) -> Vec<Animation> {
    let mut names = BTreeSet::new();
    animations
        .into_iter()
        .filter(|anim| {
            let first = names.insert(anim.name.clone());
            if !first {
                warn!(
                    asset = %key.display(),
                    animation = %anim.name,
                    start = anim.start,
                    end = anim.end,
                    "duplicate animation tag ignored"
                );
            }
            first
        })
        .collect()
}

/// Why a client script is re-injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientReason {
    /// The script itself is new or modified
    Changed,
    /// A library file it depends on changed or disappeared
    Dependency(PathBuf),
}

/// What happens to one client script this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPlan {
    Fresh { key: PathBuf },
    Stale { key: PathBuf, path: PathBuf, reason: ClientReason },
}

impl ClientPlan {
    pub fn key(&self) -> &Path {
        match self {
            ClientPlan::Fresh { key } | ClientPlan::Stale { key, .. } => key,
        }
    }
}

/// Decide which clients need injection.
///
/// A client is stale when it is stale itself, or when a library file in its
/// recorded dependency set is stale or no longer exists.
pub fn plan_clients<K>(
    state: &BuildState,
    force: bool,
    clients: &[TrackedFile],
    library_files: &[TrackedFile],
    key_of: K,
) -> Vec<ClientPlan>
where
    K: Fn(&Path) -> PathBuf,
{
    let freshness = state.freshness().with_force(force);

    let present: BTreeSet<PathBuf> = library_files.iter().map(|f| key_of(&f.path)).collect();
    let mut changed: BTreeSet<PathBuf> = library_files
        .iter()
        .map(|f| (key_of(&f.path), f.modified))
        .filter(|(key, modified)| freshness.is_stale(key, *modified))
        .map(|(key, _)| key)
        .collect();
    changed.extend(state.dependencies.reverse_index().into_keys().filter(|dep| !present.contains(dep)));

    // client -> first changed dependency, for reporting
    let mut invalidated: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
    for dep in &changed {
        for client in state.dependencies.clients_depending_on(dep) {
            invalidated.entry(client).or_insert_with(|| dep.clone());
        }
    }

    clients
        .iter()
        .map(|file| {
            let key = key_of(&file.path);
            let reason = if freshness.is_stale(&key, file.modified) {
                Some(ClientReason::Changed)
            } else {
                invalidated.get(&key).cloned().map(ClientReason::Dependency)
            };
            match reason {
                Some(reason) => {
                    debug!(client = %key.display(), ?reason, "stale");
                    ClientPlan::Stale { key, path: file.path.clone(), reason }
                }
                None => ClientPlan::Fresh { key },
            }
        })
        .collect()
}
