//! Per-animation content fingerprints.
//!
//! Fingerprints are keyed by `(asset path, animation name)` so an edit to one
//! animation in a multi-animation file re-exports only that animation.
//! The cache compares fingerprints as opaque strings; [`fingerprint_frames`]
//! is how the build computes them.

use crate::aseprite::Animation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persisted table of `asset -> animation name -> fingerprint`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimHashCache {
    entries: BTreeMap<PathBuf, BTreeMap<String, String>>,
}

impl AnimHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `animation` must be exported.
    ///
    /// True when nothing is recorded for it, when the recorded fingerprint
    /// differs, or when the animation carries no fingerprint at all.
    pub fn needs_export(&self, asset: &Path, animation: &Animation) -> bool {
        match &animation.content_hash {
            Some(hash) => self.get(asset, &animation.name) != Some(hash.as_str()),
            None => true,
        }
    }

    /// Record the fingerprint of a successfully exported animation.
    pub fn record(&mut self, asset: &Path, animation: &Animation, fingerprint: &str) {
        self.entries
            .entry(asset.to_path_buf())
            .or_default()
            .insert(animation.name.clone(), fingerprint.to_string());
    }

    /// The recorded fingerprint for an animation.
    pub fn get(&self, asset: &Path, animation_name: &str) -> Option<&str> {
        self.entries.get(asset)?.get(animation_name).map(String::as_str)
    }

    /// Drop every fingerprint recorded for an asset.
    pub fn forget_asset(&mut self, asset: &Path) -> bool {
        self.entries.remove(asset).is_some()
    }

    /// Drop the fingerprint of one animation, so it exports next run.
    pub fn forget(&mut self, asset: &Path, animation_name: &str) -> bool {
        let Some(entries) = self.entries.get_mut(asset) else {
            return false;
        };
        let removed = entries.remove(animation_name).is_some();
        if entries.is_empty() {
            self.entries.remove(asset);
        }
        removed
    }

    /// Keep only the fingerprints of animations the asset still has.
    pub fn retain_animations<'n>(&mut self, asset: &Path, names: impl IntoIterator<Item = &'n str>) {
        let keep: std::collections::BTreeSet<&str> = names.into_iter().collect();
        if let Some(entries) = self.entries.get_mut(asset) {
            entries.retain(|name, _| keep.contains(name.as_str()));
            if entries.is_empty() {
                self.entries.remove(asset);
            }
        }
    }

    /// Whether anything is recorded for an asset.
    pub fn has_asset(&self, asset: &Path) -> bool {
        self.entries.contains_key(asset)
    }

    /// Assets with at least one recorded fingerprint.
    pub fn assets(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fingerprint an animation from its frame data.
///
/// `shared` holds file-wide data every frame depends on (layers, palette).
/// Each frame is length-prefixed so moving bytes across a frame boundary
/// changes the result.
pub fn fingerprint_frames(shared: &[u8], frames: &[Vec<u8>]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(shared.len() as u64).to_le_bytes());
    hasher.update(shared);
    hasher.update(&(frames.len() as u64).to_le_bytes());
    for frame in frames {
        hasher.update(&(frame.len() as u64).to_le_bytes());
        hasher.update(frame);
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(hash: &str) -> Animation {
        Animation::new("idle", 0, 3).with_hash(hash.to_string())
    }

    #[test]
    fn test_unrecorded_needs_export() {
        let cache = AnimHashCache::new();
        assert!(cache.needs_export(Path::new("player.ase"), &idle("aaa")));
    }

    #[test]
    fn test_skip_change_record_cycle() {
        let asset = Path::new("player.ase");
        let mut cache = AnimHashCache::new();
        cache.record(asset, &idle("aaa"), "aaa");

        assert!(!cache.needs_export(asset, &idle("aaa")));

        assert!(cache.needs_export(asset, &idle("bbb")));
        assert!(cache.needs_export(asset, &idle("bbb")));

        cache.record(asset, &idle("bbb"), "bbb");
        assert!(!cache.needs_export(asset, &idle("bbb")));
    }

    #[test]
    fn test_missing_fingerprint_needs_export() {
        let asset = Path::new("player.ase");
        let mut cache = AnimHashCache::new();
        cache.record(asset, &idle("aaa"), "aaa");

        assert!(cache.needs_export(asset, &Animation::new("idle", 0, 3)));
    }

    #[test]
    fn test_scoped_per_asset() {
        let mut cache = AnimHashCache::new();
        cache.record(Path::new("player.ase"), &idle("aaa"), "aaa");

        assert!(cache.needs_export(Path::new("enemy.ase"), &idle("aaa")));
        assert_eq!(cache.get(Path::new("player.ase"), "idle"), Some("aaa"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_forget_asset() {
        let mut cache = AnimHashCache::new();
        cache.record(Path::new("player.ase"), &idle("aaa"), "aaa");

        assert!(cache.forget_asset(Path::new("player.ase")));
        assert!(!cache.forget_asset(Path::new("player.ase")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_forget_single_animation() {
        let asset = Path::new("player.ase");
        let mut cache = AnimHashCache::new();
        cache.record(asset, &idle("aaa"), "aaa");
        cache.record(asset, &Animation::new("run", 4, 7), "ccc");

        assert!(cache.forget(asset, "idle"));
        assert!(!cache.forget(asset, "idle"));
        assert!(cache.needs_export(asset, &idle("aaa")));
        assert!(cache.has_asset(asset));

        cache.forget(asset, "run");
        assert!(!cache.has_asset(asset));
    }

    #[test]
    fn test_retain_animations() {
        let asset = Path::new("player.ase");
        let mut cache = AnimHashCache::new();
        cache.record(asset, &idle("aaa"), "aaa");
        cache.record(asset, &Animation::new("run", 4, 7), "ccc");

        cache.retain_animations(asset, ["run"]);
        assert_eq!(cache.get(asset, "idle"), None);
        assert_eq!(cache.get(asset, "run"), Some("ccc"));

        cache.retain_animations(asset, Vec::<&str>::new());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_frames() {
        let a = fingerprint_frames(b"pal", &[vec![1, 2], vec![3]]);
        assert_eq!(a, fingerprint_frames(b"pal", &[vec![1, 2], vec![3]]));
        assert_eq!(a.len(), 64);

        assert_ne!(a, fingerprint_frames(b"pal", &[vec![1], vec![2, 3]]));
        assert_ne!(a, fingerprint_frames(b"pal2", &[vec![1, 2], vec![3]]));
        assert_ne!(a, fingerprint_frames(b"pal", &[vec![3], vec![1, 2]]));
        assert_ne!(fingerprint_frames(b"", &[]), fingerprint_frames(b"", &[vec![]]));
    }
}
