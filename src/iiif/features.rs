//! Declares which IIIF Image API features this server supports, and checks a
//! parsed [`super::TransformSpec`] against them.

use super::{Format, Quality, Region, Size, TransformSpec};
use crate::error::UnsupportedFeatureError;

/// A static description of the IIIF features this server is willing to
/// render. The dispatcher asks this whether a parsed spec is supported;
/// well-formed but unsupported requests return 501.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub arbitrary_rotation: bool,
    pub formats: &'static [Format],
    pub qualities: &'static [Quality],
    pub compliance_uri: &'static str,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            arbitrary_rotation: false,
            formats: &[Format::Jpg, Format::Png, Format::Gif, Format::Tif],
            qualities: &[Quality::Default, Quality::Color, Quality::Gray, Quality::Bitonal],
            compliance_uri: "http://iiif.io/api/image/2/level2.json",
        }
    }
}

impl FeatureSet {
    /// Validate that `spec` is renderable under this feature set.
    ///
    /// Region and size kinds are always supported (every variant in
    /// [`Region`]/[`Size`] is implemented by the planner); only rotation
    /// granularity, quality, and format are gated.
    pub fn check(&self, spec: &TransformSpec) -> Result<(), UnsupportedFeatureError> {
        if spec.rotation.degrees % 90 != 0 && !self.arbitrary_rotation {
            return Err(UnsupportedFeatureError(format!(
                "arbitrary rotation ({} degrees) not supported",
                spec.rotation.degrees
            )));
        }
        if !self.qualities.contains(&spec.quality) {
            return Err(UnsupportedFeatureError(format!(
                "quality {:?} not supported",
                spec.quality
            )));
        }
        if !self.formats.contains(&spec.format) {
            return Err(UnsupportedFeatureError(format!(
                "format {:?} not supported",
                spec.format
            )));
        }
        // Exercise the region/size variants so the match stays exhaustive
        // as new variants are added; all are currently supported.
        match spec.region {
            Region::Full | Region::Square | Region::Absolute { .. } | Region::Percent { .. } => {}
        }
        match spec.size {
            Size::Full
            | Size::Max
            | Size::ScaleToWidth(_)
            | Size::ScaleToHeight(_)
            | Size::ScaleExact { .. }
            | Size::ScaleBestFit { .. }
            | Size::ScalePercent(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iiif::{Identifier, Rotation, UpscaleAllowed};

    fn base_spec() -> TransformSpec {
        TransformSpec {
            id: Identifier::from_raw("img1"),
            region: Region::Full,
            size: Size::Max,
            upscale: UpscaleAllowed(false),
            rotation: Rotation::default(),
            quality: Quality::Default,
            format: Format::Jpg,
            info: false,
            base_redirect: false,
        }
    }

    #[test]
    fn default_feature_set_accepts_90_degree_rotation() {
        let fs = FeatureSet::default();
        let mut spec = base_spec();
        spec.rotation.degrees = 90;
        assert!(fs.check(&spec).is_ok());
    }

    #[test]
    fn default_feature_set_rejects_arbitrary_rotation() {
        let fs = FeatureSet::default();
        let mut spec = base_spec();
        spec.rotation.degrees = 45;
        assert!(fs.check(&spec).is_err());
    }

    #[test]
    fn feature_set_with_arbitrary_rotation_enabled() {
        let fs = FeatureSet {
            arbitrary_rotation: true,
            ..FeatureSet::default()
        };
        let mut spec = base_spec();
        spec.rotation.degrees = 45;
        assert!(fs.check(&spec).is_ok());
    }
}
