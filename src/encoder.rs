//! Encoder (§4.5): serializes a decoded, planned [`image::DynamicImage`] to
//! the requested output format.
//!
//! Extends the donor's `JpegTileEncoder` (decode-then-reencode via
//! `image::codecs::jpeg`) to the full IIIF format set.

use std::io::Cursor;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::{DynamicImage, ImageEncoder};

use crate::error::EncodeError;
use crate::iiif::Format;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const MIN_JPEG_QUALITY: u8 = 1;
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Clamp a user-supplied JPEG quality into the valid encoder range.
pub fn clamp_quality(q: u8) -> u8 {
    q.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

pub fn is_valid_quality(q: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&q)
}

/// Encode `image` as `format`, returning the bytes to write to the response
/// body. `jpeg_quality` is ignored for non-JPEG formats.
pub fn encode(image: &DynamicImage, format: Format, jpeg_quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);

    match format {
        Format::Jpg => {
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, clamp_quality(jpeg_quality));
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| EncodeError::Codec(format!("jpeg: {e}")))?;
        }
        Format::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut cursor, CompressionType::Default, PngFilterType::Adaptive);
            let (color, bytes) = png_source(image);
            encoder
                .write_image(&bytes, image.width(), image.height(), color)
                .map_err(|e| EncodeError::Codec(format!("png: {e}")))?;
        }
        Format::Gif => {
            let mut encoder = GifEncoder::new(&mut cursor);
            let rgba = image.to_rgba8();
            let frame = image::Frame::new(rgba);
            encoder
                .encode_frame(frame)
                .map_err(|e| EncodeError::Codec(format!("gif: {e}")))?;
        }
        Format::Tif => {
            // image::codecs::tiff::TiffEncoder has no Deflate/predictor knobs;
            // output is uncompressed (see DESIGN.md).
            let encoder = TiffEncoder::new(&mut cursor);
            let rgb = image.to_rgb8();
            encoder
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                .map_err(|e| EncodeError::Codec(format!("tiff: {e}")))?;
        }
    }

    Ok(buf)
}

fn png_source(image: &DynamicImage) -> (image::ExtendedColorType, Vec<u8>) {
    match image {
        DynamicImage::ImageLuma8(g) => (image::ExtendedColorType::L8, g.as_raw().clone()),
        DynamicImage::ImageRgba8(rgba) => (image::ExtendedColorType::Rgba8, rgba.as_raw().clone()),
        other => {
            let rgb = other.to_rgb8();
            (image::ExtendedColorType::Rgb8, rgb.as_raw().clone())
        }
    }
}
