//! IIIF Image API URL grammar: parsing a request path into a canonical
//! [`TransformSpec`], and rendering one back out to a path.
//!
//! The canonical path is `{id}/{region}/{size}/{rotation}/{quality}.{format}`.
//! Parsing splits from the right because `id` is itself an arbitrary,
//! possibly slash-containing string (escaped as `%2F`).

mod features;
mod info;

pub use features::FeatureSet;
pub use info::{Constraint, ImageInfo, Info, Profile, TileDescriptor};

use crate::error::UrlGrammarError;
use std::fmt;

/// An opaque, URL-safe image identifier.
///
/// Exposes an *escaped* form (for round-tripping through URLs) and a *raw*
/// form (for filesystem joins). Identity is raw-form equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Build an identifier from its raw (unescaped) form.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an identifier by decoding a single `%2F`-escaped URL segment.
    pub fn from_escaped(escaped: &str) -> Result<Self, UrlGrammarError> {
        if escaped.is_empty() {
            return Err(UrlGrammarError::EmptyIdentifier);
        }
        let raw = urlencoding::decode(escaped)
            .map_err(|_| UrlGrammarError::InvalidEscaping)?
            .into_owned();
        if raw.is_empty() {
            return Err(UrlGrammarError::EmptyIdentifier);
        }
        Ok(Self(raw))
    }

    /// The raw (unescaped) form, suitable for filesystem joins.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// The escaped form, suitable for embedding in a URL path segment.
    pub fn escaped(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The region command: which rectangle of the source to read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Full,
    Square,
    Absolute { x: u32, y: u32, w: u32, h: u32 },
    Percent { x: f64, y: f64, w: f64, h: f64 },
}

/// The size command: what output dimensions to scale the region to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    /// Deprecated alias of `Max`.
    Full,
    Max,
    ScaleToWidth(u32),
    ScaleToHeight(u32),
    ScaleExact { w: u32, h: u32 },
    /// `!w,h`: largest size fitting within `w×h`, preserving aspect ratio.
    ScaleBestFit { w: u32, h: u32 },
    ScalePercent(f64),
}

/// Whether a `Size` request permits upscaling past the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpscaleAllowed(pub bool);

/// The rotation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotation {
    pub mirror: bool,
    pub degrees: u16,
}

/// The quality command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Default,
    Color,
    Gray,
    Bitonal,
}

/// The output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Jpg,
    Png,
    Gif,
    Tif,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jpg" => Some(Format::Jpg),
            "png" => Some(Format::Png),
            "gif" => Some(Format::Gif),
            "tif" => Some(Format::Tif),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jpg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Tif => "tif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Jpg => "image/jpeg",
            Format::Png => "image/png",
            Format::Gif => "image/gif",
            Format::Tif => "image/tiff",
        }
    }
}

/// A fully-parsed IIIF (or DZI-adapted) request, reduced to its canonical
/// form. See §3 DATA MODEL.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub id: Identifier,
    pub region: Region,
    pub size: Size,
    pub upscale: UpscaleAllowed,
    pub rotation: Rotation,
    pub quality: Quality,
    pub format: Format,
    /// True ⇒ this is a metadata (`info.json`) request, not a render.
    pub info: bool,
    /// True ⇒ identifier-only URL; must 303-redirect to `…/info.json`.
    pub base_redirect: bool,
}

impl TransformSpec {
    /// The canonical `{region}/{size}/{rotation}/{quality}.{format}` command
    /// path, not including the identifier. Used as (part of) a cache key and
    /// for round-trip testing.
    pub fn canonical_command(&self) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            render_region(&self.region),
            render_size(&self.size, self.upscale),
            render_rotation(&self.rotation),
            render_quality(&self.quality),
            self.format.as_str()
        )
    }

    /// The full canonical path, including the escaped identifier.
    pub fn canonical_path(&self) -> String {
        format!("{}/{}", self.id.escaped(), self.canonical_command())
    }
}

fn render_region(region: &Region) -> String {
    match region {
        Region::Full => "full".to_string(),
        Region::Square => "square".to_string(),
        Region::Absolute { x, y, w, h } => format!("{x},{y},{w},{h}"),
        Region::Percent { x, y, w, h } => format!("pct:{x},{y},{w},{h}"),
    }
}

fn render_size(size: &Size, upscale: UpscaleAllowed) -> String {
    let prefix = if upscale.0 { "^" } else { "" };
    match size {
        Size::Full => format!("{prefix}full"),
        Size::Max => format!("{prefix}max"),
        Size::ScaleToWidth(w) => format!("{prefix}{w},"),
        Size::ScaleToHeight(h) => format!("{prefix},{h}"),
        Size::ScaleExact { w, h } => format!("{prefix}{w},{h}"),
        Size::ScaleBestFit { w, h } => format!("{prefix}!{w},{h}"),
        Size::ScalePercent(p) => format!("{prefix}pct:{}", format_pct(*p)),
    }
}

fn render_rotation(rotation: &Rotation) -> String {
    let prefix = if rotation.mirror { "!" } else { "" };
    format!("{prefix}{}", rotation.degrees)
}

fn render_quality(quality: &Quality) -> &'static str {
    match quality {
        Quality::Default => "default",
        Quality::Color => "color",
        Quality::Gray => "gray",
        Quality::Bitonal => "bitonal",
    }
}

fn format_pct(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}", p as i64)
    } else {
        format!("{p}")
    }
}

/// Parse a (query-string-stripped) IIIF request path into a [`TransformSpec`].
///
/// `path` is everything after the configured IIIF prefix has already been
/// stripped by the dispatcher, e.g. `abc%2Fdef/full/max/0/default.jpg`.
pub fn parse_iiif_path(path: &str) -> Result<TransformSpec, UrlGrammarError> {
    let path = path.trim_start_matches('/').trim_end_matches('/');
    if path.is_empty() {
        return Err(UrlGrammarError::EmptyIdentifier);
    }

    let segments: Vec<&str> = path.split('/').collect();

    // Identifier-only URL: no command segments at all.
    if segments.len() == 1 {
        let id = Identifier::from_escaped(segments[0])?;
        return Ok(TransformSpec {
            id,
            region: Region::Full,
            size: Size::Max,
            upscale: UpscaleAllowed(false),
            rotation: Rotation::default(),
            quality: Quality::Default,
            format: Format::Jpg,
            info: false,
            base_redirect: true,
        });
    }

    // `{id}/info.json`
    if segments.len() == 2 && segments[1] == "info.json" {
        let id = Identifier::from_escaped(segments[0])?;
        return Ok(TransformSpec {
            id,
            region: Region::Full,
            size: Size::Max,
            upscale: UpscaleAllowed(false),
            rotation: Rotation::default(),
            quality: Quality::Default,
            format: Format::Jpg,
            info: true,
            base_redirect: false,
        });
    }

    if segments.len() < 5 {
        return Err(UrlGrammarError::MalformedSegment {
            segment: "path",
            reason: format!("expected id/region/size/rotation/quality.format, got {path:?}"),
        });
    }

    // Split from the right: the last four segments are fixed; everything
    // before them, rejoined, is the identifier (which may itself contain
    // escaped slashes as a single segment, or may have been pre-escaped
    // entirely as one segment — either way the tail never ambiguates with it
    // because region/size/rotation/quality.format have a fixed shape).
    let n = segments.len();
    let id_segments = &segments[..n - 4];
    let region_seg = segments[n - 4];
    let size_seg = segments[n - 3];
    let rotation_seg = segments[n - 2];
    let quality_format_seg = segments[n - 1];

    let id = Identifier::from_escaped(&id_segments.join("/"))?;
    let region = parse_region(region_seg)?;
    let (size, upscale) = parse_size(size_seg)?;
    let rotation = parse_rotation(rotation_seg)?;
    let (quality, format) = parse_quality_format(quality_format_seg)?;

    Ok(TransformSpec {
        id,
        region,
        size,
        upscale,
        rotation,
        quality,
        format,
        info: false,
        base_redirect: false,
    })
}

fn parse_region(seg: &str) -> Result<Region, UrlGrammarError> {
    let bad = |reason: &str| UrlGrammarError::MalformedSegment {
        segment: "region",
        reason: reason.to_string(),
    };

    if seg == "full" {
        return Ok(Region::Full);
    }
    if seg == "square" {
        return Ok(Region::Square);
    }
    if let Some(rest) = seg.strip_prefix("pct:") {
        let parts = parse_four_numbers::<f64>(rest).ok_or_else(|| bad("expected pct:x,y,w,h"))?;
        let [x, y, w, h] = parts;
        if w <= 0.0 || h <= 0.0 {
            return Err(bad("w and h must be positive"));
        }
        return Ok(Region::Percent { x, y, w, h });
    }
    let parts = parse_four_numbers::<u32>(seg).ok_or_else(|| bad("expected x,y,w,h"))?;
    let [x, y, w, h] = parts;
    if w == 0 || h == 0 {
        return Err(bad("w and h must be positive"));
    }
    Ok(Region::Absolute { x, y, w, h })
}

fn parse_four_numbers<T: std::str::FromStr>(s: &str) -> Option<[T; 4]> {
    let mut parts = s.split(',');
    let a = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    let c = parts.next()?.parse().ok()?;
    let d = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some([a, b, c, d])
}

fn parse_size(seg: &str) -> Result<(Size, UpscaleAllowed), UrlGrammarError> {
    let bad = |reason: &str| UrlGrammarError::MalformedSegment {
        segment: "size",
        reason: reason.to_string(),
    };

    let (upscale, seg) = match seg.strip_prefix('^') {
        Some(rest) => (UpscaleAllowed(true), rest),
        None => (UpscaleAllowed(false), seg),
    };

    if seg == "full" {
        return Ok((Size::Full, upscale));
    }
    if seg == "max" {
        return Ok((Size::Max, upscale));
    }
    if let Some(rest) = seg.strip_prefix("pct:") {
        let p: f64 = rest.parse().map_err(|_| bad("expected pct:n"))?;
        if p <= 0.0 {
            return Err(bad("percent must be positive"));
        }
        return Ok((Size::ScalePercent(p), upscale));
    }
    if let Some(rest) = seg.strip_prefix('!') {
        let (w, h) = parse_wh_pair(rest).ok_or_else(|| bad("expected !w,h"))?;
        return Ok((Size::ScaleBestFit { w, h }, upscale));
    }
    if let Some((w_str, h_str)) = seg.split_once(',') {
        if h_str.is_empty() {
            let w: u32 = w_str.parse().map_err(|_| bad("expected w,"))?;
            if w == 0 {
                return Err(bad("w must be positive"));
            }
            return Ok((Size::ScaleToWidth(w), upscale));
        }
        if w_str.is_empty() {
            let h: u32 = h_str.parse().map_err(|_| bad("expected ,h"))?;
            if h == 0 {
                return Err(bad("h must be positive"));
            }
            return Ok((Size::ScaleToHeight(h), upscale));
        }
        let w: u32 = w_str.parse().map_err(|_| bad("expected w,h"))?;
        let h: u32 = h_str.parse().map_err(|_| bad("expected w,h"))?;
        if w == 0 || h == 0 {
            return Err(bad("w and h must be positive"));
        }
        return Ok((Size::ScaleExact { w, h }, upscale));
    }

    Err(bad("unrecognized size syntax"))
}

fn parse_wh_pair(s: &str) -> Option<(u32, u32)> {
    let (w_str, h_str) = s.split_once(',')?;
    let w: u32 = w_str.parse().ok()?;
    let h: u32 = h_str.parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

fn parse_rotation(seg: &str) -> Result<Rotation, UrlGrammarError> {
    let bad = || UrlGrammarError::MalformedSegment {
        segment: "rotation",
        reason: format!("expected [!]degrees, got {seg:?}"),
    };

    let (mirror, rest) = match seg.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, seg),
    };
    let degrees: f64 = rest.parse().map_err(|_| bad())?;
    if !(0.0..=360.0).contains(&degrees) {
        return Err(bad());
    }
    Ok(Rotation {
        mirror,
        degrees: degrees as u16 % 360,
    })
}

fn parse_quality_format(seg: &str) -> Result<(Quality, Format), UrlGrammarError> {
    let (quality_str, format_str) = seg.rsplit_once('.').ok_or_else(|| {
        UrlGrammarError::MalformedSegment {
            segment: "quality.format",
            reason: format!("expected quality.format, got {seg:?}"),
        }
    })?;

    let quality = match quality_str {
        "default" => Quality::Default,
        "color" => Quality::Color,
        "gray" => Quality::Gray,
        "bitonal" => Quality::Bitonal,
        other => {
            return Err(UrlGrammarError::MalformedSegment {
                segment: "quality",
                reason: format!("unknown quality {other:?}"),
            })
        }
    };

    let format = Format::parse(format_str).ok_or_else(|| UrlGrammarError::MalformedSegment {
        segment: "format",
        reason: format!("unknown format {format_str:?}"),
    })?;

    Ok((quality, format))
}
