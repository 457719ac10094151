use crate::buffer::PixelBuffer;
use crate::error::OcrError;
use image::imageops::unsharpen;

/// Gaussian blur sigma for the unsharp mask
const BLUR_SIGMA: f32 = 1.0;
/// Minimum difference from the blurred image before a pixel is boosted
const UNSHARP_THRESHOLD: i32 = 2;

/// Unsharp-mask sharpening
/// Enhances edges to make text strokes more distinct
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    let gray = buffer.to_gray();
    let sharpened = unsharpen(&gray, BLUR_SIGMA, UNSHARP_THRESHOLD);
    Ok(PixelBuffer::from_gray(sharpened))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharpen_enhances_edges() {
        // Left half dark, right half light
        let buffer = PixelBuffer::from_fn_gray(20, 10, |x, _| if x < 10 { 50 } else { 200 });

        let result = apply(buffer).unwrap();

        let edge_left = result.luma(9, 5);
        let edge_right = result.luma(10, 5);

        let original_diff = 200i32 - 50;
        let result_diff = (edge_right as i32 - edge_left as i32).abs();

        assert!(
            result_diff >= original_diff,
            "Edge should be enhanced: {} >= {}",
            result_diff,
            original_diff
        );
    }
}
