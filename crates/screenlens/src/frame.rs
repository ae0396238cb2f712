//! Captured frame handling: raw pixels plus encode helpers for previews.

use base64::{engine::general_purpose, Engine};
use std::io::Cursor;

/// Default maximum dimension when encoding a preview (width or height).
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

/// One screenshot's pixel data, RGBA, row-major.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Error type for frame encoding operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image processing error: {0}")]
    ImageProcessing(String),
    #[error("PNG encoding error: {0}")]
    PngEncoding(String),
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Encode the frame as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, FrameError> {
        encode_rgba_to_png(&self.data, self.width, self.height)
    }

    /// Encode the frame as PNG, downscaled so neither dimension exceeds
    /// `max_dimension` (aspect ratio preserved).
    pub fn to_png_resized(&self, max_dimension: Option<u32>) -> Result<Vec<u8>, FrameError> {
        let max_dim = max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION);
        if self.width <= max_dim && self.height <= max_dim {
            return self.to_png();
        }
        let (new_width, new_height) = self.resized_dimensions(max_dim);
        let img = image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(
            self.width,
            self.height,
            self.data.clone(),
        )
        .ok_or_else(|| FrameError::ImageProcessing("pixel buffer/dimension mismatch".into()))?;
        let resized = image::imageops::resize(
            &img,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );
        encode_rgba_to_png(&resized.into_raw(), new_width, new_height)
    }

    /// Base64-encoded PNG, for embedding in JSON responses.
    pub fn to_base64_png(&self, max_dimension: Option<u32>) -> Result<String, FrameError> {
        let png = self.to_png_resized(max_dimension)?;
        Ok(general_purpose::STANDARD.encode(&png))
    }

    /// Dimensions after a resize to `max_dimension` would be applied.
    pub fn resized_dimensions(&self, max_dimension: u32) -> (u32, u32) {
        if self.width <= max_dimension && self.height <= max_dimension {
            return (self.width, self.height);
        }
        let scale = (max_dimension as f32 / self.width.max(self.height) as f32).min(1.0);
        (
            (self.width as f32 * scale).round() as u32,
            (self.height as f32 * scale).round() as u32,
        )
    }
}

fn encode_rgba_to_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    let mut png_data = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut png_data));
    encoder
        .write_image(rgba, width, height, ExtendedColorType::Rgba8)
        .map_err(|e| FrameError::PngEncoding(e.to_string()))?;
    Ok(png_data)
}
