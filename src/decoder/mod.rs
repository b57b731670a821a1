//! Decoder Port (§4.3): the minimal contract any pyramidal decoder must
//! satisfy, plus the concrete JPEG2000 binding.
//!
//! The port carries no allocation policy; buffers it returns are owned by
//! the caller. It is implemented synchronously — decode is a CPU-bound FFI
//! call, not I/O — so callers dispatch it through `spawn_blocking`.

mod jp2;

pub use jp2::Jp2Decoder;

use crate::error::DecodeError;

/// An absolute pixel-coordinate box in source (level-0) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Box {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A decoded pixel grid: width/height/channel count, row stride, and raw
/// bytes. Row-major, top-to-bottom, interleaved channels — the semantic
/// format any source-language decoder binding must normalize to.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub stride: usize,
    pub bytes: bytes::Bytes,
}

impl PixelBuffer {
    /// View this buffer as an `image::RgbImage`/`GrayImage`-compatible
    /// `DynamicImage`, used by the planner and encoder.
    pub fn into_dynamic_image(self) -> Result<image::DynamicImage, DecodeError> {
        let buf = if self.stride == self.width as usize * self.channels as usize {
            self.bytes.to_vec()
        } else {
            // Strip row padding.
            let row_len = self.width as usize * self.channels as usize;
            let mut out = Vec::with_capacity(row_len * self.height as usize);
            for row in 0..self.height as usize {
                let start = row * self.stride;
                out.extend_from_slice(&self.bytes[start..start + row_len]);
            }
            out
        };
        match self.channels {
            1 => image::GrayImage::from_raw(self.width, self.height, buf)
                .map(image::DynamicImage::ImageLuma8)
                .ok_or_else(|| DecodeError::Codec("pixel buffer size mismatch".into())),
            3 => image::RgbImage::from_raw(self.width, self.height, buf)
                .map(image::DynamicImage::ImageRgb8)
                .ok_or_else(|| DecodeError::Codec("pixel buffer size mismatch".into())),
            4 => image::RgbaImage::from_raw(self.width, self.height, buf)
                .map(image::DynamicImage::ImageRgba8)
                .ok_or_else(|| DecodeError::Codec("pixel buffer size mismatch".into())),
            n => Err(DecodeError::Codec(format!("unsupported channel count {n}"))),
        }
    }
}

/// Format-agnostic interface over a single open pyramidal source.
///
/// A `Decoder` is opened for exactly one request's lifetime (§3 Resource);
/// it is never shared between concurrent requests.
pub trait Decoder: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// 0 if the source is untiled.
    fn tile_width(&self) -> u32;
    fn tile_height(&self) -> u32;
    /// 1 for untiled sources.
    fn levels(&self) -> u32;

    /// The downsample factor of `level` relative to level 0 (`2^level`).
    fn level_downsample(&self, level: u32) -> f64 {
        (1u64 << level) as f64
    }

    /// Read `region` (in level-0 source coordinates) decoded at `level`.
    /// `region` is expressed in level-0 coordinates; implementations divide
    /// by `level_downsample(level)` internally.
    fn read_region(&self, region: Box, level: u32) -> Result<PixelBuffer, DecodeError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// A fixed-size synthetic decoder used by planner/cache/handler tests in
    /// place of a real JP2 file, mirroring the donor's `MockReader`/
    /// `SlideSource` test doubles.
    pub struct MockDecoder {
        pub width: u32,
        pub height: u32,
        pub tile_width: u32,
        pub tile_height: u32,
        pub levels: u32,
    }

    impl MockDecoder {
        pub fn new(width: u32, height: u32) -> Self {
            let levels = levels_for(width, height);
            Self {
                width,
                height,
                tile_width: 512,
                tile_height: 512,
                levels,
            }
        }
    }

    fn levels_for(width: u32, height: u32) -> u32 {
        let mut dim = width.max(height);
        let mut levels = 1;
        while dim > 512 {
            dim /= 2;
            levels += 1;
        }
        levels
    }

    impl Decoder for MockDecoder {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn tile_width(&self) -> u32 {
            self.tile_width
        }
        fn tile_height(&self) -> u32 {
            self.tile_height
        }
        fn levels(&self) -> u32 {
            self.levels
        }

        fn read_region(&self, region: Box, level: u32) -> Result<PixelBuffer, DecodeError> {
            let downsample = self.level_downsample(level);
            let w = ((region.w as f64) / downsample).round().max(1.0) as u32;
            let h = ((region.h as f64) / downsample).round().max(1.0) as u32;
            let channels = 3u8;
            let stride = w as usize * channels as usize;
            let mut bytes = vec![0u8; stride * h as usize];
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = (i % 256) as u8;
            }
            Ok(PixelBuffer {
                width: w,
                height: h,
                channels,
                stride,
                bytes: bytes::Bytes::from(bytes),
            })
        }
    }

    #[test]
    fn mock_decoder_levels_respect_minimum_tile() {
        let d = MockDecoder::new(6000, 4000);
        assert!(d.levels >= 1);
        assert_eq!(d.width, 6000);
    }

    #[test]
    fn mock_decoder_read_region_scales_by_level() {
        let d = MockDecoder::new(2048, 1024);
        let full = d.read_region(Box { x: 0, y: 0, w: 2048, h: 1024 }, 0).unwrap();
        assert_eq!((full.width, full.height), (2048, 1024));
        let half = d.read_region(Box { x: 0, y: 0, w: 2048, h: 1024 }, 1).unwrap();
        assert_eq!((half.width, half.height), (1024, 512));
    }
}
