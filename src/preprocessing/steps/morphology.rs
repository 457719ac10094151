//! Binary morphology on ink masks
//!
//! A pixel is ink when its first channel is below 128. Results are written
//! as 0 (ink) or 255 (paper) into every channel. The structuring element is
//! a square of radius `kernel_size / 2`, applied as separate row and column
//! passes.

use crate::buffer::PixelBuffer;
use crate::error::OcrError;

const DARK_THRESHOLD: u8 = 128;

/// Ink spreads to every pixel within the kernel (window clipped at borders)
pub fn dilate(buffer: &PixelBuffer, kernel_size: u32) -> Result<PixelBuffer, OcrError> {
    let half = half_width(kernel_size)?;
    let mask = ink_mask(buffer);
    let (w, h) = (buffer.width() as usize, buffer.height() as usize);

    let rows = pass(&mask, w, h, half, Axis::Row, Rule::Any);
    let out = pass(&rows, w, h, half, Axis::Column, Rule::Any);
    Ok(to_buffer(buffer, &out))
}

/// A pixel stays ink only if the whole kernel is ink; out-of-bounds
/// neighbors are paper, so ink touching the border erodes away
pub fn erode(buffer: &PixelBuffer, kernel_size: u32) -> Result<PixelBuffer, OcrError> {
    let half = half_width(kernel_size)?;
    let mask = ink_mask(buffer);
    let (w, h) = (buffer.width() as usize, buffer.height() as usize);

    let rows = pass(&mask, w, h, half, Axis::Row, Rule::All);
    let out = pass(&rows, w, h, half, Axis::Column, Rule::All);
    Ok(to_buffer(buffer, &out))
}

/// Dilate then erode: reconnects broken strokes
pub fn close(buffer: &PixelBuffer, kernel_size: u32) -> Result<PixelBuffer, OcrError> {
    erode(&dilate(buffer, kernel_size)?, kernel_size)
}

/// Erode then dilate: removes specks and separates touching glyphs
pub fn open(buffer: &PixelBuffer, kernel_size: u32) -> Result<PixelBuffer, OcrError> {
    dilate(&erode(buffer, kernel_size)?, kernel_size)
}

fn half_width(kernel_size: u32) -> Result<usize, OcrError> {
    if kernel_size == 0 {
        return Err(OcrError::PreprocessingError(
            "Morphology kernel size must be positive".to_string(),
        ));
    }
    Ok((kernel_size / 2) as usize)
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

#[derive(Clone, Copy)]
enum Rule {
    Any,
    All,
}

fn ink_mask(buffer: &PixelBuffer) -> Vec<bool> {
    buffer
        .pixels()
        .iter()
        .step_by(buffer.channels() as usize)
        .map(|&v| v < DARK_THRESHOLD)
        .collect()
}

/// One-dimensional min/max filter along `axis`
fn pass(mask: &[bool], w: usize, h: usize, half: usize, axis: Axis, rule: Rule) -> Vec<bool> {
    let (len, lines) = match axis {
        Axis::Row => (w, h),
        Axis::Column => (h, w),
    };
    let index = |line: usize, pos: usize| match axis {
        Axis::Row => line * w + pos,
        Axis::Column => pos * w + line,
    };

    let mut out = vec![false; mask.len()];
    for line in 0..lines {
        for pos in 0..len {
            let lo = pos.saturating_sub(half);
            let hi = (pos + half).min(len - 1);
            let mut window = (lo..=hi).map(|p| mask[index(line, p)]);
            out[index(line, pos)] = match rule {
                Rule::Any => window.any(|ink| ink),
                Rule::All => pos >= half && pos + half < len && window.all(|ink| ink),
            };
        }
    }
    out
}

fn to_buffer(source: &PixelBuffer, mask: &[bool]) -> PixelBuffer {
    let width = source.width() as usize;
    source.map_replicated(|x, y| {
        if mask[y as usize * width + x as usize] {
            0
        } else {
            255
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with<F: Fn(u32, u32) -> bool>(w: u32, h: u32, ink: F) -> PixelBuffer {
        PixelBuffer::from_fn_gray(w, h, |x, y| if ink(x, y) { 0 } else { 255 })
    }

    #[test]
    fn test_open_removes_isolated_speck() {
        let speck = page_with(20, 20, |x, y| x == 10 && y == 10);

        let opened = open(&speck, 3).unwrap();

        assert!(opened.pixels().iter().all(|&p| p == 255));
    }

    #[test]
    fn test_close_fills_stroke_gap() {
        // Horizontal stroke five pixels thick with a one-pixel break at x = 15
        let stroke = page_with(30, 20, |x, y| (8..13).contains(&y) && (3..27).contains(&x) && x != 15);

        let closed = close(&stroke, 3).unwrap();

        for y in 8..13 {
            assert_eq!(closed.luma(15, y), 0, "gap not filled at row {}", y);
        }
    }

    #[test]
    fn test_close_then_open_preserves_clean_shape() {
        let block = page_with(40, 30, |x, y| (10..30).contains(&x) && (8..20).contains(&y));

        let result = open(&close(&block, 3).unwrap(), 3).unwrap();

        assert_eq!(result, block);
    }

    #[test]
    fn test_erosion_is_conservative_at_borders() {
        let full = page_with(10, 10, |_, _| true);

        let eroded = erode(&full, 3).unwrap();

        assert_eq!(eroded.luma(0, 0), 255);
        assert_eq!(eroded.luma(9, 5), 255);
        assert_eq!(eroded.luma(5, 5), 0);
    }

    #[test]
    fn test_dilation_clips_at_borders() {
        let corner = page_with(5, 5, |x, y| x == 0 && y == 0);

        let dilated = dilate(&corner, 3).unwrap();

        assert_eq!(dilated.luma(1, 1), 0);
        assert_eq!(dilated.luma(2, 2), 255);
    }

    #[test]
    fn test_even_kernel_uses_floor_half() {
        let speck = page_with(9, 9, |x, y| x == 4 && y == 4);
        assert_eq!(dilate(&speck, 2).unwrap(), dilate(&speck, 3).unwrap());
    }

    #[test]
    fn test_multichannel_output_is_replicated() {
        let buffer = PixelBuffer::new(3, 1, 3, vec![0, 9, 9, 255, 255, 255, 255, 255, 255]).unwrap();

        let dilated = dilate(&buffer, 3).unwrap();

        assert_eq!(dilated.pixels(), &[0, 0, 0, 0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_zero_kernel_is_rejected() {
        let buffer = PixelBuffer::filled(3, 3, 0);
        assert!(dilate(&buffer, 0).is_err());
    }
}
