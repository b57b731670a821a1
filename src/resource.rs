//! Resource and Decode Planner (§4.4): binds an identifier to a decoded
//! source, computes an efficient decode plan, and executes crop/scale/rotate.

use image::DynamicImage;

use crate::decoder::{Box as SrcBox, Decoder};
use crate::error::{DecodeError, PlanError};
use crate::iiif::{Constraint, Quality, Region, Rotation, Size, TransformSpec, UpscaleAllowed};

/// The decode plan chosen by [`plan`]: which source box to read, at which
/// pyramid level, and what post-scale to apply afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodePlan {
    pub source_box: SrcBox,
    pub decode_level: u32,
    pub out_width: u32,
    pub out_height: u32,
}

/// Resolve `region` to an absolute source-coordinate box, clipped to the
/// source bounds. `Square` selects the centered largest square, biased
/// toward the upper-left on an odd remainder (§9 resolved design decision).
pub fn resolve_region(region: Region, src_w: u32, src_h: u32) -> Result<SrcBox, PlanError> {
    if src_w == 0 || src_h == 0 {
        return Err(PlanError::EmptySource);
    }
    let clip = |x: u32, y: u32, w: u32, h: u32| -> SrcBox {
        let x = x.min(src_w);
        let y = y.min(src_h);
        let w = w.min(src_w.saturating_sub(x)).max(1);
        let h = h.min(src_h.saturating_sub(y)).max(1);
        SrcBox { x, y, w, h }
    };

    Ok(match region {
        Region::Full => SrcBox { x: 0, y: 0, w: src_w, h: src_h },
        Region::Square => {
            let side = src_w.min(src_h);
            if src_w >= src_h {
                let x = (src_w - side) / 2;
                SrcBox { x, y: 0, w: side, h: side }
            } else {
                let y = (src_h - side) / 2;
                SrcBox { x: 0, y, w: side, h: side }
            }
        }
        Region::Absolute { x, y, w, h } => clip(x, y, w, h),
        Region::Percent { x, y, w, h } => {
            let to_px_x = |p: f64| ((p / 100.0) * src_w as f64).round() as u32;
            let to_px_y = |p: f64| ((p / 100.0) * src_h as f64).round() as u32;
            clip(to_px_x(x), to_px_y(y), to_px_x(w).max(1), to_px_y(h).max(1))
        }
    })
}

/// Resolve `size` against a source box to concrete output dimensions.
pub fn resolve_size(
    size: Size,
    upscale: UpscaleAllowed,
    box_w: u32,
    box_h: u32,
) -> Result<(u32, u32), PlanError> {
    let cap = |w: u32, h: u32| -> (u32, u32) {
        if upscale.0 {
            (w, h)
        } else {
            (w.min(box_w).max(1), h.min(box_h).max(1))
        }
    };

    Ok(match size {
        Size::Full | Size::Max => (box_w, box_h),
        Size::ScaleToWidth(w) => {
            let h = ((w as f64) * box_h as f64 / box_w as f64).round().max(1.0) as u32;
            cap(w, h)
        }
        Size::ScaleToHeight(h) => {
            let w = ((h as f64) * box_w as f64 / box_h as f64).round().max(1.0) as u32;
            cap(w, h)
        }
        Size::ScaleExact { w, h } => cap(w, h),
        Size::ScaleBestFit { w, h } => {
            let scale = (w as f64 / box_w as f64).min(h as f64 / box_h as f64);
            let out_w = (box_w as f64 * scale).round().max(1.0) as u32;
            let out_h = (box_h as f64 * scale).round().max(1.0) as u32;
            cap(out_w, out_h)
        }
        Size::ScalePercent(p) => {
            let out_w = (box_w as f64 * p / 100.0).round().max(1.0) as u32;
            let out_h = (box_h as f64 * p / 100.0).round().max(1.0) as u32;
            cap(out_w, out_h)
        }
    })
}

/// Pick the largest `decodeLevel` such that the decoded box width is still
/// `>= out_w` (§4.4 step 4): `level = floor(log2(box_w / out_w))`, clamped
/// to `[0, levels-1]`.
pub fn choose_decode_level(box_w: u32, out_w: u32, levels: u32) -> u32 {
    if levels <= 1 || out_w == 0 || box_w <= out_w {
        return 0;
    }
    let ratio = box_w as f64 / out_w as f64;
    let level = ratio.log2().floor().max(0.0) as u32;
    level.min(levels - 1)
}

/// Compute the full decode plan for `spec` against a source of the given
/// dimensions and pyramid, enforcing `constraint` (§4.4 step 3).
pub fn plan(
    spec: &TransformSpec,
    src_w: u32,
    src_h: u32,
    levels: u32,
    constraint: Constraint,
) -> Result<DecodePlan, PlanError> {
    let source_box = resolve_region(spec.region, src_w, src_h)?;
    let (out_w, out_h) = resolve_size(spec.size, spec.upscale, source_box.w, source_box.h)?;

    let area = out_w as u64 * out_h as u64;
    if area > constraint.area || out_w > constraint.width || out_h > constraint.height {
        return Err(PlanError::DimensionsExceedLimits {
            width: out_w,
            height: out_h,
            area,
        });
    }

    let decode_level = if levels <= 1 {
        0
    } else {
        choose_decode_level(source_box.w, out_w, levels)
    };

    Ok(DecodePlan {
        source_box,
        decode_level,
        out_width: out_w,
        out_height: out_h,
    })
}

/// Execute a plan against an open decoder: decode, post-scale, rotate,
/// quality-convert. Steps 5-8 of §4.4.
pub fn execute(
    decoder: &dyn Decoder,
    plan: &DecodePlan,
    rotation: Rotation,
    quality: Quality,
) -> Result<DynamicImage, DecodeError> {
    let pixels = decoder.read_region(plan.source_box, plan.decode_level)?;
    let mut image = pixels.into_dynamic_image()?;

    if image.width() != plan.out_width || image.height() != plan.out_height {
        image = image.resize_exact(
            plan.out_width,
            plan.out_height,
            image::imageops::FilterType::Triangle,
        );
    }

    if rotation.mirror {
        image = image.fliph();
    }
    image = match rotation.degrees % 360 {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    };

    image = match quality {
        Quality::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
        Quality::Bitonal => {
            let gray = image.to_luma8();
            let mut out = gray.clone();
            for p in out.pixels_mut() {
                p.0[0] = if p.0[0] >= 128 { 255 } else { 0 };
            }
            DynamicImage::ImageLuma8(out)
        }
        Quality::Color | Quality::Default => image,
    };

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_region_is_whole_image() {
        let b = resolve_region(Region::Full, 100, 50).unwrap();
        assert_eq!(b, SrcBox { x: 0, y: 0, w: 100, h: 50 });
    }

    #[test]
    fn square_on_landscape_centers_horizontally() {
        let b = resolve_region(Region::Square, 100, 50).unwrap();
        assert_eq!(b, SrcBox { x: 25, y: 0, w: 50, h: 50 });
    }

    #[test]
    fn square_on_portrait_centers_vertically() {
        let b = resolve_region(Region::Square, 50, 100).unwrap();
        assert_eq!(b, SrcBox { x: 0, y: 25, w: 50, h: 50 });
    }

    #[test]
    fn square_on_square_image_equals_full() {
        let b = resolve_region(Region::Square, 80, 80).unwrap();
        assert_eq!(b, SrcBox { x: 0, y: 0, w: 80, h: 80 });
    }

    #[test]
    fn square_odd_remainder_biases_upper_left() {
        // 101 - 50 = 51, 51/2 = 25 (floor) -> offset 25, leaving 26 on the right.
        let b = resolve_region(Region::Square, 101, 50).unwrap();
        assert_eq!(b.x, 25);
    }

    #[test]
    fn absolute_region_clips_to_bounds() {
        let b = resolve_region(Region::Absolute { x: 90, y: 40, w: 50, h: 50 }, 100, 50).unwrap();
        assert_eq!(b, SrcBox { x: 90, y: 40, w: 10, h: 10 });
    }

    #[test]
    fn scale_to_width_preserves_aspect() {
        let (w, h) = resolve_size(Size::ScaleToWidth(512), UpscaleAllowed(false), 1536, 1024).unwrap();
        assert_eq!((w, h), (512, 341));
    }

    #[test]
    fn best_fit_caps_at_source_when_upscale_disallowed() {
        let (w, h) = resolve_size(
            Size::ScaleBestFit { w: 10_000, h: 10_000 },
            UpscaleAllowed(false),
            800,
            600,
        )
        .unwrap();
        assert_eq!((w, h), (800, 600));
    }

    #[test]
    fn decode_level_keeps_post_scale_in_half_to_one_range() {
        // box 2048 wide, want 500: ratio 4.096, floor(log2)=2 -> level 2 (downsample 4x -> 512)
        let level = choose_decode_level(2048, 500, 5);
        assert_eq!(level, 2);
    }

    #[test]
    fn decode_level_clamped_to_available_levels() {
        let level = choose_decode_level(1_000_000, 1, 3);
        assert_eq!(level, 2);
    }

    #[test]
    fn plan_rejects_dimensions_exceeding_area_constraint() {
        let spec = TransformSpec {
            id: crate::iiif::Identifier::from_raw("x"),
            region: Region::Full,
            size: Size::ScaleExact { w: 2048, h: 2048 },
            upscale: UpscaleAllowed(false),
            rotation: Rotation::default(),
            quality: Quality::Default,
            format: crate::iiif::Format::Jpg,
            info: false,
            base_redirect: false,
        };
        let constraint = Constraint { width: 1024, height: 1024, area: u64::MAX };
        let err = plan(&spec, 4000, 4000, 8, constraint).unwrap_err();
        assert!(matches!(err, PlanError::DimensionsExceedLimits { .. }));
    }

    #[test]
    fn untiled_source_always_decodes_at_level_zero() {
        let spec = TransformSpec {
            id: crate::iiif::Identifier::from_raw("x"),
            region: Region::Full,
            size: Size::Max,
            upscale: UpscaleAllowed(false),
            rotation: Rotation::default(),
            quality: Quality::Default,
            format: crate::iiif::Format::Jpg,
            info: false,
            base_redirect: false,
        };
        let plan = plan(&spec, 2000, 1000, 1, Constraint::UNCONSTRAINED).unwrap();
        assert_eq!(plan.decode_level, 0);
    }
}
