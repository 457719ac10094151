use crate::buffer::PixelBuffer;
use crate::error::OcrError;

/// Convert image to grayscale
/// This is the foundation for most other preprocessing steps
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    Ok(convert(buffer))
}

/// Infallible conversion, also used as the last-resort fallback
pub fn convert(buffer: PixelBuffer) -> PixelBuffer {
    let channels = buffer.channels() as usize;
    if channels == 1 {
        return buffer;
    }

    let (width, height) = buffer.dimensions();
    let pixels = buffer.pixels();
    PixelBuffer::from_fn_gray(width, height, |x, y| {
        let idx = (y as usize * width as usize + x as usize) * channels;
        if channels < 3 {
            // Luma + alpha
            return pixels[idx];
        }
        // ITU-R BT.601 luma weights
        let r = pixels[idx] as u32;
        let g = pixels[idx + 1] as u32;
        let b = pixels[idx + 2] as u32;
        ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
    })
}
