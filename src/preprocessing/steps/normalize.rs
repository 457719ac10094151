use crate::buffer::PixelBuffer;
use crate::error::OcrError;

/// Normalize image contrast using histogram stretching
/// Maps pixel values to use full 0-255 range
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    let (min_val, max_val) = find_min_max(&buffer);

    // Avoid division by zero
    if max_val <= min_val {
        return Ok(buffer);
    }

    let range = (max_val - min_val) as f32;
    Ok(buffer.map_replicated(|x, y| {
        let pixel = buffer.luma(x, y);
        ((pixel - min_val) as f32 / range * 255.0).round() as u8
    }))
}

fn find_min_max(buffer: &PixelBuffer) -> (u8, u8) {
    let mut min = 255u8;
    let mut max = 0u8;

    for val in buffer.pixels().iter().step_by(buffer.channels() as usize) {
        min = min.min(*val);
        max = max.max(*val);
    }

    (min, max)
}
