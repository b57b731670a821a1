//! Deep Zoom (DZI) Adapter (§4.10): serves the `.dzi` XML descriptor and
//! `_files/{level}/{col}_{row}.jpg` tiles by translating them into the same
//! [`crate::resource`] decode pipeline the IIIF dispatcher uses.
//!
//! `generate_dzi_xml`/`max_level` are adapted near-verbatim from the donor's
//! `dzi.rs`; tile-to-region translation replaces the donor's WSI-pyramid
//! level lookup with the fixed-1024-tile algorithm of the Go original's
//! `DZITile`.

use crate::iiif::{Format, Identifier, Quality, Region, Rotation, Size, TransformSpec, UpscaleAllowed};

/// Deep Zoom's fixed tile edge length. Not configurable; the protocol bakes
/// it into the descriptor and the directory layout.
pub const DZI_TILE_SIZE: u32 = 1024;

/// The highest DZI level for an image of size `width x height`: the level at
/// which a single tile covers the whole image, `ceil(log2(max(w, h)))`.
pub fn max_level(width: u32, height: u32) -> u32 {
    let dim = width.max(height).max(1);
    (dim as f64).log2().ceil() as u32
}

/// Render the `.dzi` XML descriptor for an image.
pub fn generate_dzi_xml(width: u32, height: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image TileSize="{tile}" Overlap="0" Format="jpg" xmlns="http://schemas.microsoft.com/deepzoom/2008">
  <Size Width="{width}" Height="{height}"/>
</Image>
"#,
        tile = DZI_TILE_SIZE,
        width = width,
        height = height,
    )
}

#[derive(Debug, thiserror::Error)]
pub enum DziTileError {
    #[error("level {level} out of range (max {max})")]
    LevelOutOfRange { level: u32, max: u32 },
    #[error("tile coordinates {col},{row} out of range")]
    TileOutOfRange { col: u32, row: u32 },
}

/// Parse a `_files/{level}/{col}_{row}.jpg` path suffix into `(level, col, row)`.
pub fn parse_tile_path(level_seg: &str, filename: &str) -> Option<(u32, u32, u32)> {
    let level: u32 = level_seg.parse().ok()?;
    let stem = filename.strip_suffix(".jpg")?;
    let (col_str, row_str) = stem.split_once('_')?;
    let col: u32 = col_str.parse().ok()?;
    let row: u32 = row_str.parse().ok()?;
    Some((level, col, row))
}

/// Translate a requested DZI tile into a [`TransformSpec`] against the same
/// source the IIIF dispatcher would use.
///
/// Mirrors the Go original's `DZITile`: levels below 8 are clamped up to 8
/// rather than rejected (`if l < 8 { l = 8 }`), since a DZI pyramid bottoms
/// out there and viewers requesting a lower level still expect a (small)
/// tile back, the source box at `level` is `S = 2^(maxLevel - level) *
/// DZI_TILE_SIZE` pixels square, clipped to the image bounds, and the
/// requested output width scales `DZI_TILE_SIZE` down proportionally to
/// however much that box was clipped.
pub fn dzi_tile_to_spec(
    id: Identifier,
    width: u32,
    height: u32,
    level: u32,
    col: u32,
    row: u32,
) -> Result<TransformSpec, DziTileError> {
    const MIN_LEVEL: u32 = 8;
    let max = max_level(width, height);
    let level = level.max(MIN_LEVEL);
    if level > max {
        return Err(DziTileError::LevelOutOfRange { level, max });
    }

    let scale = 1u64 << (max - level);
    let tile_span = scale * DZI_TILE_SIZE as u64;

    let x0 = col as u64 * tile_span;
    let y0 = row as u64 * tile_span;
    if x0 >= width as u64 || y0 >= height as u64 {
        return Err(DziTileError::TileOutOfRange { col, row });
    }

    let box_w = tile_span.min(width as u64 - x0);
    let box_h = tile_span.min(height as u64 - y0);

    let out_w = (DZI_TILE_SIZE as u64 * box_w / tile_span).max(1) as u32;
    let out_h = (DZI_TILE_SIZE as u64 * box_h / tile_span).max(1) as u32;

    Ok(TransformSpec {
        id,
        region: Region::Absolute { x: x0 as u32, y: y0 as u32, w: box_w as u32, h: box_h as u32 },
        size: Size::ScaleExact { w: out_w, h: out_h },
        upscale: UpscaleAllowed(false),
        rotation: Rotation::default(),
        quality: Quality::Default,
        format: Format::Jpg,
        info: false,
        base_redirect: false,
    })
}
