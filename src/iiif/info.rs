//! Info Builder: constructs the IIIF `info.json` payload (§4.6).

use serde::{Deserialize, Serialize};

use super::{FeatureSet, Identifier};

/// Decoded-source metadata, populated from the decoder and cached under `id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub levels: u32,
}

/// Pixel caps. "Unconstrained" is represented as `u32::MAX`/`u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub width: u32,
    pub height: u32,
    pub area: u64,
}

impl Constraint {
    pub const UNCONSTRAINED: Constraint = Constraint {
        width: u32::MAX,
        height: u32::MAX,
        area: u64::MAX,
    };

    /// True if this constraint would actually bite for an image of this size
    /// — i.e. the image is larger than any constrained dimension.
    pub fn smaller_than(&self, width: u32, height: u32) -> bool {
        self.width < width || self.height < height || self.area < (width as u64 * height as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "maxArea", skip_serializing_if = "Option::is_none")]
    pub max_area: Option<u64>,
    #[serde(rename = "maxWidth", skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(rename = "maxHeight", skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "scaleFactors")]
    pub scale_factors: Vec<u32>,
}

/// The IIIF `info.json` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub protocol: String,
    pub width: u32,
    pub height: u32,
    pub profile: (String, Profile),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileDescriptor>>,
}

/// Scale factors begin at 1 and double until either dimension divided by the
/// factor drops below 16 (§4.6, §8 invariant "no dimension < 16").
fn scale_factors(width: u32, height: u32) -> Vec<u32> {
    let mut factors = Vec::new();
    let mut scale = 1u32;
    loop {
        if width / scale < 16 || height / scale < 16 {
            break;
        }
        factors.push(scale);
        match scale.checked_mul(2) {
            Some(next) => scale = next,
            None => break,
        }
    }
    if factors.is_empty() {
        factors.push(1);
    }
    factors
}

/// Build the `info.json` payload for a decoded source.
///
/// `iiif_base` is the server's public IIIF base URL (scheme+server+prefix);
/// the `@id` field is `{iiif_base}/{escaped id}`, per §4.6.
pub fn build_info(
    id: &Identifier,
    image: ImageInfo,
    constraint: Constraint,
    iiif_base: &str,
    features: &FeatureSet,
    advertised_tile_sizes: &[u32],
) -> Info {
    let profile_limits_apply = constraint.smaller_than(image.width, image.height);

    let profile = Profile {
        max_area: profile_limits_apply.then_some(constraint.area),
        max_width: profile_limits_apply.then_some(constraint.width),
        max_height: profile_limits_apply.then_some(constraint.height),
        formats: features.formats.iter().map(|f| f.as_str().to_string()).collect(),
        qualities: features
            .qualities
            .iter()
            .map(|q| format!("{q:?}").to_lowercase())
            .collect(),
        supports: Vec::new(),
    };

    let tiled = image.tile_width > 0
        && image.tile_width < image.width
        && image.tile_height < image.height;

    let tiles = if tiled {
        let sizes = if advertised_tile_sizes.is_empty() {
            &[image.tile_width][..]
        } else {
            advertised_tile_sizes
        };
        Some(
            sizes
                .iter()
                .map(|&w| TileDescriptor {
                    width: w,
                    height: None,
                    scale_factors: scale_factors(image.width, image.height),
                })
                .collect(),
        )
    } else {
        None
    };

    Info {
        context: "http://iiif.io/api/image/2/context.json".to_string(),
        id: format!("{}/{}", iiif_base.trim_end_matches('/'), id.escaped()),
        protocol: "http://iiif.io/api/image".to_string(),
        width: image.width,
        height: image.height,
        profile: (features.compliance_uri.to_string(), profile),
        tiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factors_cut_off_below_16() {
        // 6000x4000: log2(6000)~12.55 -> 1,2,4,...,4096 while both dims /scale >= 16
        // 4000/256=15.6<16 so 256 excluded; 4000/128=31.25 included
        let factors = scale_factors(6000, 4000);
        assert_eq!(*factors.last().unwrap(), 128);
        assert!(factors.iter().all(|&s| 4000 / s >= 16 && 6000 / s >= 16));
    }

    #[test]
    fn small_image_has_factor_one_only() {
        let factors = scale_factors(20, 20);
        assert_eq!(factors, vec![1]);
    }

    #[test]
    fn profile_limits_omitted_when_unconstrained() {
        let info = build_info(
            &Identifier::from_raw("img1"),
            ImageInfo { width: 100, height: 100, tile_width: 0, tile_height: 0, levels: 1 },
            Constraint::UNCONSTRAINED,
            "http://example.com/iiif",
            &FeatureSet::default(),
            &[],
        );
        assert!(info.profile.1.max_width.is_none());
    }

    #[test]
    fn profile_limits_present_when_constraint_bites() {
        let constraint = Constraint { width: 50, height: 50, area: 2500 };
        let info = build_info(
            &Identifier::from_raw("img1"),
            ImageInfo { width: 100, height: 100, tile_width: 0, tile_height: 0, levels: 1 },
            constraint,
            "http://example.com/iiif",
            &FeatureSet::default(),
            &[],
        );
        assert_eq!(info.profile.1.max_width, Some(50));
    }

    #[test]
    fn tiles_omitted_for_untiled_source() {
        let info = build_info(
            &Identifier::from_raw("img1"),
            ImageInfo { width: 100, height: 100, tile_width: 0, tile_height: 0, levels: 1 },
            Constraint::UNCONSTRAINED,
            "http://example.com/iiif",
            &FeatureSet::default(),
            &[512],
        );
        assert!(info.tiles.is_none());
    }

    #[test]
    fn tiles_present_for_tiled_source() {
        let info = build_info(
            &Identifier::from_raw("img1"),
            ImageInfo { width: 6000, height: 4000, tile_width: 512, tile_height: 512, levels: 8 },
            Constraint::UNCONSTRAINED,
            "http://example.com/iiif",
            &FeatureSet::default(),
            &[512],
        );
        let tiles = info.tiles.unwrap();
        assert_eq!(tiles[0].width, 512);
    }

    #[test]
    fn id_field_is_full_canonical_url() {
        let info = build_info(
            &Identifier::from_raw("a/b"),
            ImageInfo { width: 10, height: 10, tile_width: 0, tile_height: 0, levels: 1 },
            Constraint::UNCONSTRAINED,
            "http://example.com/iiif",
            &FeatureSet::default(),
            &[],
        );
        assert_eq!(info.id, format!("http://example.com/iiif/{}", Identifier::from_raw("a/b").escaped()));
    }
}
