//! Image normalization before storage
//!
//! Uploaded images are bounded in size before they become assets so project
//! exports stay reasonably small.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use tracing::debug;

use crate::config::DEFAULT_MAX_IMAGE_DIMENSION;
use crate::storage::{StoreError, StoreResult};

/// Turns raw upload bytes into the blob that gets stored
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Stores bytes unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ImageNormalizer for Passthrough {
    fn normalize(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Scales images down so neither side exceeds `max_dimension`
///
/// Aspect ratio is kept and the result is re-encoded in the source format.
/// Images already within bounds are stored byte-for-byte.
#[derive(Debug, Clone, Copy)]
pub struct ResizeNormalizer {
    max_dimension: u32,
}

impl ResizeNormalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl Default for ResizeNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_DIMENSION)
    }
}

impl ImageNormalizer for ResizeNormalizer {
    fn normalize(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        let format = image::guess_format(bytes)
            .map_err(|e| StoreError::Validation(format!("unrecognized image format: {}", e)))?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| StoreError::Validation(format!("could not decode image: {}", e)))?;

        let (width, height) = img.dimensions();
        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(bytes.to_vec());
        }

        let resized = img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
        debug!(
            "Resized {:?} image from {}x{} to {}x{}",
            format,
            width,
            height,
            resized.width(),
            resized.height()
        );

        let mut out = Cursor::new(Vec::new());
        resized
            .write_to(&mut out, encodable(format))
            .map_err(|e| StoreError::Validation(format!("could not re-encode image: {}", e)))?;
        Ok(out.into_inner())
    }
}

/// Formats we can decode but not write fall back to PNG
fn encodable(format: ImageFormat) -> ImageFormat {
    if format.writing_enabled() {
        format
    } else {
        ImageFormat::Png
    }
}
