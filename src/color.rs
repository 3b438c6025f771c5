//! Tag color parsing
//!
//! Aseprite stores a tag color as an RGB triplet. Configuration refers to
//! colors either by Aseprite's preset tag names or by hex notation:
//! - Named: `red`, `orange`, `yellow`, `green`, `blue`, `purple`, `black`
//! - Hex: `#RGB`, `#RRGGBB`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Input string was empty
    #[error("empty color string")]
    Empty,
    /// Invalid length (must be 3 or 6 hex chars after #)
    #[error("invalid color length {0}, expected 3 or 6")]
    InvalidLength(usize),
    /// Contains non-hex characters
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
    /// Not a hex color and not one of the preset names
    #[error("unknown tag color '{0}' (expected one of {names} or #RRGGBB)", names = preset_names())]
    UnknownName(String),
}

/// Aseprite's preset tag colors, in the order its tag dialog lists them.
const PRESETS: [(&str, [u8; 3]); 7] = [
    ("red", [254, 91, 89]),
    ("orange", [247, 165, 71]),
    ("yellow", [243, 206, 82]),
    ("green", [106, 205, 91]),
    ("blue", [87, 185, 242]),
    ("purple", [209, 134, 223]),
    ("black", [0, 0, 0]),
];

fn preset_names() -> String {
    PRESETS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
}

/// The color of a tag, compared by exact RGB value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagColor(pub [u8; 3]);

impl TagColor {
    pub const RED: TagColor = TagColor(PRESETS[0].1);
    pub const ORANGE: TagColor = TagColor(PRESETS[1].1);
    pub const YELLOW: TagColor = TagColor(PRESETS[2].1);
    pub const GREEN: TagColor = TagColor(PRESETS[3].1);
    pub const BLUE: TagColor = TagColor(PRESETS[4].1);
    pub const PURPLE: TagColor = TagColor(PRESETS[5].1);
    pub const BLACK: TagColor = TagColor(PRESETS[6].1);

    /// Create a color from raw RGB components.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        TagColor([r, g, b])
    }

    /// The preset name for this color, if it is one of Aseprite's presets.
    pub fn preset_name(&self) -> Option<&'static str> {
        PRESETS.iter().find(|(_, rgb)| *rgb == self.0).map(|(name, _)| *name)
    }
}

impl fmt::Display for TagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.preset_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2]),
        }
    }
}

impl FromStr for TagColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag_color(s)
    }
}

impl TryFrom<String> for TagColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_tag_color(&value)
    }
}

impl From<TagColor> for String {
    fn from(color: TagColor) -> Self {
        color.to_string()
    }
}

/// Parse a tag color from a preset name or hex string.
///
/// # Examples
///
/// ```
/// use aseforge::color::{parse_tag_color, TagColor};
///
/// assert_eq!(parse_tag_color("red").unwrap(), TagColor::RED);
/// assert_eq!(parse_tag_color("#F00").unwrap(), TagColor::rgb(255, 0, 0));
/// assert_eq!(parse_tag_color("#57b9f2").unwrap(), TagColor::BLUE);
/// ```
pub fn parse_tag_color(s: &str) -> Result<TagColor, ColorError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ColorError::Empty);
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex_color(hex);
    }

    let lower = s.to_ascii_lowercase();
    PRESETS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgb)| TagColor(*rgb))
        .ok_or_else(|| ColorError::UnknownName(s.to_string()))
}

/// Parse the digits of a hex color (without the leading '#')
fn parse_hex_color(hex: &str) -> Result<TagColor, ColorError> {
    for c in hex.chars() {
        if !c.is_ascii_hexdigit() {
            return Err(ColorError::InvalidHex(c));
        }
    }

    let digits: Vec<u8> = hex.chars().map(parse_hex_digit).collect::<Result<_, _>>()?;
    match digits.as_slice() {
        // #RGB -> #RRGGBB (doubled digits)
        [r, g, b] => Ok(TagColor([r * 17, g * 17, b * 17])),
        [r1, r0, g1, g0, b1, b0] => Ok(TagColor([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0])),
        _ => Err(ColorError::InvalidLength(digits.len())),
    }
}

/// Parse a single hex digit (0-9, A-F, a-f) to u8 (0-15)
fn parse_hex_digit(c: char) -> Result<u8, ColorError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        'a'..='f' => Ok(c as u8 - b'a' + 10),
        'A'..='F' => Ok(c as u8 - b'A' + 10),
        _ => Err(ColorError::InvalidHex(c)),
    }
}
