//! Tag decomposition.
//!
//! An asset's tags are split by color into animation tags and window tags.
//! Each animation tag becomes an [`Animation`]; window tags that fall wholly
//! inside an animation become that animation's [`Window`]s, renumbered so
//! the animation's first frame is frame 1.
//!
//! # Example
//!
//! ```
//! use aseforge::aseprite::{decompose, TagRange};
//! use aseforge::color::TagColor;
//! use std::collections::BTreeSet;
//!
//! let tags = vec![
//!     TagRange::new("run", 0, 3, TagColor::RED),
//!     TagRange::new("hitbox", 1, 2, TagColor::BLUE),
//! ];
//! let anim_colors = BTreeSet::from([TagColor::RED]);
//! let window_colors = BTreeSet::from([TagColor::BLUE]);
//!
//! let anims = decompose(&tags, &anim_colors, &window_colors, 4, "A");
//! assert_eq!(anims.len(), 1);
//! assert_eq!(anims[0].name, "run");
//! assert_eq!((anims[0].windows[0].start, anims[0].windows[0].end), (2, 3));
//! ```

use crate::aseprite::TagRange;
use crate::color::TagColor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named sub-range of an animation, 1-based relative to the animation start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub name: String,
    pub start: i32,
    pub end: i32,
}

impl Window {
    /// Number of frames covered; zero for reversed ranges.
    pub fn frame_count(&self) -> usize {
        span(self.start, self.end)
    }
}

/// A named frame range exported as one sprite strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    /// First frame in the asset (0-based, inclusive)
    pub start: i32,
    /// Last frame in the asset (0-based, inclusive)
    pub end: i32,
    /// Windows in source tag order
    pub windows: Vec<Window>,
    /// Fingerprint of this animation's frame data, once computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Animation {
    pub fn new(name: impl Into<String>, start: i32, end: i32) -> Self {
        Self { name: name.into(), start, end, windows: Vec::new(), content_hash: None }
    }

    /// Number of frames in the animation; zero for reversed ranges.
    pub fn frame_count(&self) -> usize {
        span(self.start, self.end)
    }

    /// Whether an absolute frame index falls inside this animation.
    pub fn contains_frame(&self, frame: i32) -> bool {
        self.start <= frame && frame <= self.end
    }

    /// Attach a content fingerprint.
    pub fn with_hash(mut self, hash: String) -> Self {
        self.content_hash = Some(hash);
        self
    }
}

fn span(start: i32, end: i32) -> usize {
    if end < start {
        0
    } else {
        (end - start) as usize + 1
    }
}

/// Decompose an asset's tags into animations with windows.
///
/// - Tags whose color is in `anim_colors` become animations, in tag order.
/// - With no animation tags, a single animation named `file_name` covers
///   frames `0..=num_frames-1`.
/// - A tag whose color is in `window_colors` becomes a window of every
///   animation that contains both its start and end frame. Tags straddling
///   an animation boundary are dropped, not clipped.
pub fn decompose(
    tags: &[TagRange],
    anim_colors: &BTreeSet<TagColor>,
    window_colors: &BTreeSet<TagColor>,
    num_frames: usize,
    file_name: &str,
) -> Vec<Animation> {
    let mut anims: Vec<Animation> = tags
        .iter()
        .filter(|tag| anim_colors.contains(&tag.color))
        .map(|tag| Animation::new(tag.name.clone(), tag.start, tag.end))
        .collect();

    if anims.is_empty() {
        anims.push(Animation::new(file_name, 0, num_frames as i32 - 1));
    }

    for anim in &mut anims {
        anim.windows = windows_in_range(tags, window_colors, anim);
    }

    anims
}

fn windows_in_range(
    tags: &[TagRange],
    window_colors: &BTreeSet<TagColor>,
    anim: &Animation,
) -> Vec<Window> {
    tags.iter()
        .filter(|tag| {
            window_colors.contains(&tag.color)
                && anim.contains_frame(tag.start)
                && anim.contains_frame(tag.end)
        })
        .map(|tag| Window {
            name: tag.name.clone(),
            start: tag.start - anim.start + 1,
            end: tag.end - anim.start + 1,
        })
        .collect()
}
