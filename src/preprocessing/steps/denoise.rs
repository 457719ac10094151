use crate::buffer::PixelBuffer;
use crate::error::OcrError;
use imageproc::filter::median_filter;

/// Apply median filter to reduce noise
/// Median filter preserves edges better than Gaussian blur
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    let gray = buffer.to_gray();
    // 3x3 median filter (radius 1) - effective for salt-and-pepper noise
    let denoised = median_filter(&gray, 1, 1);
    Ok(PixelBuffer::from_gray(denoised))
}
