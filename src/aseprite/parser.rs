//! Aseprite binary parser.
//!
//! Only the parts of the format the build needs are decoded:
//!
//! - the file header (magic `0xA5E0`, frame count)
//! - frame headers (magic `0xF1FA`, chunk count)
//! - the tags chunk (`0x2018`) and the user data chunks (`0x2020`) that follow
//!   it, which carry tag colors in newer files
//! - the raw bytes of pixel-relevant chunks, kept for fingerprinting
//!
//! Everything else is skipped by its declared chunk size.

use crate::color::TagColor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const HEADER_SIZE: usize = 128;
const FRAME_HEADER_SIZE: usize = 16;
const CHUNK_HEADER_SIZE: usize = 6;

const FILE_MAGIC: u16 = 0xA5E0;
const FRAME_MAGIC: u16 = 0xF1FA;

const CHUNK_OLD_PALETTE_A: u16 = 0x0004;
const CHUNK_OLD_PALETTE_B: u16 = 0x0011;
const CHUNK_LAYER: u16 = 0x2004;
const CHUNK_CEL: u16 = 0x2005;
const CHUNK_CEL_EXTRA: u16 = 0x2006;
const CHUNK_TAGS: u16 = 0x2018;
const CHUNK_PALETTE: u16 = 0x2019;
const CHUNK_USER_DATA: u16 = 0x2020;

const USER_DATA_HAS_TEXT: u32 = 1;
const USER_DATA_HAS_COLOR: u32 = 2;

/// The asset could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CorruptAssetError {
    /// File shorter than the fixed header
    #[error("file too short for an aseprite header ({0} bytes)")]
    TooShort(usize),
    /// Wrong file magic number
    #[error("bad file magic 0x{0:04X}, expected 0xA5E0")]
    BadMagic(u16),
    /// Wrong frame magic number
    #[error("frame {frame}: bad frame magic 0x{magic:04X}, expected 0xF1FA")]
    BadFrameMagic { frame: usize, magic: u16 },
    /// A size field points past the end of the data
    #[error("truncated data at offset {offset} (needed {needed} bytes)")]
    Truncated { offset: usize, needed: usize },
    /// A declared size is smaller than its own header
    #[error("invalid {what} size {size} at offset {offset}")]
    InvalidSize { what: &'static str, size: usize, offset: usize },
    /// A tag name is not UTF-8
    #[error("tag name at offset {0} is not valid UTF-8")]
    InvalidName(usize),
}

/// A named, colored frame interval embedded in an asset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRange {
    pub name: String,
    /// First frame (0-based, inclusive)
    pub start: i32,
    /// Last frame (0-based, inclusive)
    pub end: i32,
    pub color: TagColor,
}

impl TagRange {
    pub fn new(name: impl Into<String>, start: i32, end: i32, color: TagColor) -> Self {
        Self { name: name.into(), start, end, color }
    }
}

/// What the build needs from one parsed asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetData {
    pub num_frames: usize,
    /// Tags in file order
    pub tags: Vec<TagRange>,
    /// Pixel-relevant chunk bytes per frame (cels)
    pub frames: Vec<Vec<u8>>,
    /// File-wide chunk bytes every frame depends on (layers, palettes)
    pub shared: Vec<u8>,
}

impl AssetData {
    /// Frame bytes for an inclusive frame range.
    ///
    /// Ranges with `start > end` or outside the file are treated as empty.
    pub fn frame_range(&self, start: i32, end: i32) -> &[Vec<u8>] {
        if start < 0 || end < start {
            return &[];
        }
        let start = start as usize;
        let end = (end as usize).min(self.frames.len().saturating_sub(1));
        if start >= self.frames.len() || end < start {
            return &[];
        }
        &self.frames[start..=end]
    }
}

/// Parses asset bytes into [`AssetData`].
pub trait AssetParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<AssetData, CorruptAssetError>;
}

/// Parser for the Aseprite `.ase`/`.aseprite` format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsepriteParser;

impl AssetParser for AsepriteParser {
    fn parse(&self, bytes: &[u8]) -> Result<AssetData, CorruptAssetError> {
        parse_aseprite(bytes)
    }
}

/// Parse an Aseprite file.
pub fn parse_aseprite(bytes: &[u8]) -> Result<AssetData, CorruptAssetError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CorruptAssetError::TooShort(bytes.len()));
    }

    let mut header = ByteReader::new(bytes);
    let _file_size = header.u32()?;
    let magic = header.u16()?;
    if magic != FILE_MAGIC {
        return Err(CorruptAssetError::BadMagic(magic));
    }
    let num_frames = header.u16()? as usize;

    let mut data = AssetData { num_frames, ..Default::default() };
    let mut offset = HEADER_SIZE;

    for frame_index in 0..num_frames {
        let mut reader = ByteReader::at(bytes, offset);
        let frame_size = reader.u32()? as usize;
        let magic = reader.u16()?;
        if magic != FRAME_MAGIC {
            return Err(CorruptAssetError::BadFrameMagic { frame: frame_index, magic });
        }
        if frame_size < FRAME_HEADER_SIZE {
            return Err(CorruptAssetError::InvalidSize { what: "frame", size: frame_size, offset });
        }
        let old_chunks = reader.u16()? as usize;
        let _duration = reader.u16()?;
        reader.skip(2)?;
        let new_chunks = reader.u32()? as usize;
        let chunk_count = if new_chunks == 0 { old_chunks } else { new_chunks };

        let frame_end = offset
            .checked_add(frame_size)
            .filter(|end| *end <= bytes.len())
            .ok_or(CorruptAssetError::Truncated { offset, needed: frame_size })?;

        let mut pixels = Vec::new();
        let mut chunk_offset = offset + FRAME_HEADER_SIZE;
        // Index of the next tag to receive a user data color, while inside
        // the run of user data chunks that follows a tags chunk.
        let mut tag_cursor: Option<usize> = None;

        for _ in 0..chunk_count {
            let mut chunk = ByteReader::at(&bytes[..frame_end], chunk_offset);
            let chunk_size = chunk.u32()? as usize;
            let chunk_type = chunk.u16()?;
            if chunk_size < CHUNK_HEADER_SIZE {
                return Err(CorruptAssetError::InvalidSize {
                    what: "chunk",
                    size: chunk_size,
                    offset: chunk_offset,
                });
            }
            let body = chunk.bytes(chunk_size - CHUNK_HEADER_SIZE)?;

            match chunk_type {
                CHUNK_TAGS => {
                    let first_new = data.tags.len();
                    data.tags.extend(parse_tags(body, chunk_offset + CHUNK_HEADER_SIZE)?);
                    tag_cursor = Some(first_new);
                }
                CHUNK_USER_DATA => {
                    if let Some(index) = tag_cursor {
                        if let Some(color) = parse_user_data_color(body)? {
                            if let Some(tag) = data.tags.get_mut(index) {
                                tag.color = color;
                            }
                        }
                        tag_cursor = Some(index + 1);
                    }
                }
                CHUNK_CEL | CHUNK_CEL_EXTRA => {
                    tag_cursor = None;
                    pixels.extend_from_slice(&bytes[chunk_offset..chunk_offset + chunk_size]);
                }
                CHUNK_LAYER | CHUNK_PALETTE | CHUNK_OLD_PALETTE_A | CHUNK_OLD_PALETTE_B => {
                    tag_cursor = None;
                    data.shared.extend_from_slice(&bytes[chunk_offset..chunk_offset + chunk_size]);
                }
                _ => tag_cursor = None,
            }

            chunk_offset += chunk_size;
        }

        data.frames.push(pixels);
        offset = frame_end;
    }

    Ok(data)
}

fn parse_tags(body: &[u8], base_offset: usize) -> Result<Vec<TagRange>, CorruptAssetError> {
    let mut reader = ByteReader::new(body).with_base(base_offset);
    let count = reader.u16()? as usize;
    reader.skip(8)?;

    let mut tags = Vec::with_capacity(count);
    for _ in 0..count {
        let from = reader.u16()? as i32;
        let to = reader.u16()? as i32;
        let _direction = reader.u8()?;
        let _repeat = reader.u16()?;
        reader.skip(6)?;
        let rgb = reader.bytes(3)?;
        reader.skip(1)?;
        let name = reader.string()?;
        tags.push(TagRange::new(name, from, to, TagColor([rgb[0], rgb[1], rgb[2]])));
    }
    Ok(tags)
}

fn parse_user_data_color(body: &[u8]) -> Result<Option<TagColor>, CorruptAssetError> {
    let mut reader = ByteReader::new(body);
    let flags = reader.u32()?;
    if flags & USER_DATA_HAS_TEXT != 0 {
        reader.string()?;
    }
    if flags & USER_DATA_HAS_COLOR != 0 {
        let rgba = reader.bytes(4)?;
        return Ok(Some(TagColor([rgba[0], rgba[1], rgba[2]])));
    }
    Ok(None)
}

/// Little-endian cursor over a byte slice.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Added to positions in error messages
    base: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos, base: 0 }
    }

    fn with_base(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], CorruptAssetError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len()).ok_or(
            CorruptAssetError::Truncated { offset: self.base + self.pos, needed: n },
        )?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), CorruptAssetError> {
        self.bytes(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, CorruptAssetError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CorruptAssetError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CorruptAssetError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self) -> Result<String, CorruptAssetError> {
        let start = self.base + self.pos;
        let len = self.u16()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CorruptAssetError::InvalidName(start))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_parse_frames_and_tags() {
        let bytes = build(&[
            vec![tags_chunk(&[("run", 0, 2, [254, 91, 89]), ("hitbox", 1, 1, [87, 185, 242])]), cel(&[1, 2])],
            vec![cel(&[3])],
            vec![cel(&[4, 5, 6])],
        ]);

        let data = parse_aseprite(&bytes).unwrap();
        assert_eq!(data.num_frames, 3);
        assert_eq!(
            data.tags,
            vec![
                TagRange::new("run", 0, 2, TagColor::RED),
                TagRange::new("hitbox", 1, 1, TagColor::BLUE),
            ]
        );
        assert_eq!(data.frames.len(), 3);
        assert!(data.frames[0].ends_with(&[1, 2]));
        assert!(data.frames[2].ends_with(&[4, 5, 6]));
    }

    #[test]
    fn test_user_data_overrides_tag_color() {
        let bytes = build(&[vec![
            tags_chunk(&[("idle", 0, 0, [0, 0, 0]), ("walk", 0, 0, [0, 0, 0])]),
            user_data_color([106, 205, 91]),
            user_data_color([209, 134, 223]),
        ]]);

        let data = parse_aseprite(&bytes).unwrap();
        assert_eq!(data.tags[0].color, TagColor::GREEN);
        assert_eq!(data.tags[1].color, TagColor::PURPLE);
    }

    #[test]
    fn test_parse_no_frames() {
        let data = parse_aseprite(&build(&[])).unwrap();
        assert_eq!(data.num_frames, 0);
        assert!(data.tags.is_empty());
        assert!(data.frames.is_empty());
    }

    #[test]
    fn test_too_short() {
        assert_eq!(parse_aseprite(&[0; 10]), Err(CorruptAssetError::TooShort(10)));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = build(&[]);
        bytes[4] = 0;
        assert!(matches!(parse_aseprite(&bytes), Err(CorruptAssetError::BadMagic(_))));
    }

    #[test]
    fn test_bad_frame_magic() {
        let mut bytes = build(&[vec![cel(&[1])]]);
        bytes[HEADER_SIZE + 4] = 0;
        assert!(matches!(
            parse_aseprite(&bytes),
            Err(CorruptAssetError::BadFrameMagic { frame: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_frame() {
        let bytes = build(&[vec![cel(&[1, 2, 3, 4])]]);
        let cut = &bytes[..bytes.len() - 2];
        assert!(matches!(parse_aseprite(cut), Err(CorruptAssetError::Truncated { .. })));
    }

    #[test]
    fn test_frame_range() {
        let data = AssetData {
            num_frames: 3,
            frames: vec![vec![1], vec![2], vec![3]],
            ..Default::default()
        };
        assert_eq!(data.frame_range(1, 2), &[vec![2], vec![3]]);
        assert_eq!(data.frame_range(0, 10).len(), 3);
        assert!(data.frame_range(2, 1).is_empty());
        assert!(data.frame_range(0, -1).is_empty());
        assert!(data.frame_range(5, 6).is_empty());
    }
}
