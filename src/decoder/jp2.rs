//! JPEG2000 binding for the [`super::Decoder`] port, via the `jpeg2k` crate
//! (OpenJPEG bindings).
//!
//! Opening a decoder reads just enough of the file to learn its dimensions
//! and resolution-level count; `read_region` performs the actual decode,
//! which is a blocking FFI call the caller must run on a blocking thread.

use std::path::{Path, PathBuf};

use jpeg2k::{DecodeParameters, Image};

use super::{Box, Decoder, PixelBuffer};
use crate::error::DecodeError;

/// A JPEG2000 file opened through the `jpeg2k` (OpenJPEG) binding.
///
/// One instance is opened per request (§3 Resource) and discarded when the
/// request completes; it holds no state shared across requests.
pub struct Jp2Decoder {
    path: PathBuf,
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    levels: u32,
}

impl Jp2Decoder {
    /// Open `path` and read its header to learn dimensions, tile grid, and
    /// resolution-level count.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let image = Image::from_bytes(&bytes)
            .map_err(|e| DecodeError::Codec(format!("failed to read JP2 header: {e}")))?;

        let width = image.width();
        let height = image.height();
        let tile_width = image.tile_width().unwrap_or(0);
        let tile_height = image.tile_height().unwrap_or(0);
        let levels = image.num_resolutions().max(1);

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            tile_width,
            tile_height,
            levels,
        })
    }
}

impl Decoder for Jp2Decoder {
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
        let bytes = std::fs::read(&self.path).map_err(|source| DecodeError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        let params = DecodeParameters::default()
            .reduce_factor(Some(level))
            .decode_area(Some((region.x, region.y, region.x + region.w, region.y + region.h)));

        let image = Image::from_bytes_with(&bytes, params)
            .map_err(|e| DecodeError::Codec(format!("JP2 decode failed: {e}")))?;

        let width = image.width();
        let height = image.height();
        let components = image.components();
        let channels = components.len() as u8;
        if channels == 0 {
            return Err(DecodeError::Codec("decoded image has no components".into()));
        }

        let mut bytes_out = Vec::with_capacity(width as usize * height as usize * channels as usize);
        for pixel in 0..(width as usize * height as usize) {
            for component in &components {
                bytes_out.push(component.data()[pixel] as u8);
            }
        }

        Ok(PixelBuffer {
            width,
            height,
            channels,
            stride: width as usize * channels as usize,
            bytes: bytes::Bytes::from(bytes_out),
        })
    }
}
