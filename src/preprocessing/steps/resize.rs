use crate::buffer::{self, PixelBuffer};
use crate::error::OcrError;
use image::imageops::FilterType;

/// Images with a side below this are upscaled
const MIN_DIMENSION: u32 = 1000;
/// Smallest scale factor used when upscaling
const MIN_SCALE: f32 = 1.5;
/// Upscaling never produces a side longer than this
const MAX_DIMENSION: u32 = 6000;

/// Upscale small or low-resolution images so thresholding and morphology
/// have enough pixels per stroke
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    let (width, height) = buffer.dimensions();
    let Some((new_width, new_height)) = target_dimensions(width, height) else {
        return Ok(buffer);
    };

    tracing::debug!(
        "Upscaling {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );
    buffer::resize(&buffer, new_width, new_height, FilterType::Lanczos3)
}

fn target_dimensions(width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    if width >= MIN_DIMENSION && height >= MIN_DIMENSION {
        return None;
    }

    let mut scale = (MIN_DIMENSION as f32 / width as f32)
        .max(MIN_DIMENSION as f32 / height as f32)
        .max(MIN_SCALE);

    // Clamp to max dimension
    let longest = width.max(height) as f32;
    if longest * scale > MAX_DIMENSION as f32 {
        scale = MAX_DIMENSION as f32 / longest;
    }
    if scale <= 1.0 {
        return None;
    }

    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    Some((new_width, new_height))
}
