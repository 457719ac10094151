use crate::buffer::PixelBuffer;
use crate::error::OcrError;

/// Fixed brightness offset applied after the multiplier
pub const CONTRAST_OFFSET: f32 = -20.0;

/// Linear contrast boost: `value * multiplier + offset`, clamped to 0-255
pub fn apply(buffer: PixelBuffer, multiplier: f32) -> Result<PixelBuffer, OcrError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(OcrError::PreprocessingError(format!(
            "Invalid contrast multiplier: {}",
            multiplier
        )));
    }

    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = (value as f32 * multiplier + CONTRAST_OFFSET)
            .round()
            .clamp(0.0, 255.0) as u8;
    }

    Ok(buffer.map_replicated(|x, y| lut[buffer.luma(x, y) as usize]))
}
