use crate::buffer::PixelBuffer;
use crate::error::OcrError;

/// Local-mean adaptive thresholding
///
/// A pixel becomes white (255) when it is brighter than the mean of the
/// `block_size` square around it minus `c`, and black (0) otherwise. The
/// window is clipped at the image border and the mean uses the clipped area.
/// Output has the same shape as the input with the result in every channel.
pub fn apply(buffer: PixelBuffer, block_size: u32, c: f64) -> Result<PixelBuffer, OcrError> {
    if block_size == 0 || block_size % 2 == 0 {
        return Err(OcrError::PreprocessingError(format!(
            "Threshold block size must be odd, got {}",
            block_size
        )));
    }

    let table = IntegralImage::new(&buffer);
    let (width, height) = buffer.dimensions();
    let half = (block_size / 2) as i64;

    Ok(buffer.map_replicated(|x, y| {
        let x1 = (x as i64 - half).max(0) as u32;
        let y1 = (y as i64 - half).max(0) as u32;
        let x2 = (x as i64 + half).min(width as i64 - 1) as u32;
        let y2 = (y as i64 + half).min(height as i64 - 1) as u32;

        let mean = table.mean(x1, y1, x2, y2);
        if buffer.luma(x, y) as f64 > mean - c {
            255
        } else {
            0
        }
    }))
}

/// Summed-area table over the first channel, one row and column of zero padding
struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn new(buffer: &PixelBuffer) -> Self {
        let (width, height) = (buffer.width() as usize, buffer.height() as usize);
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0u64;
            for x in 0..width {
                row_sum += buffer.luma(x as u32, y as u32) as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }

        Self { stride, sums }
    }

    /// Sum over the inclusive rectangle (x1, y1)-(x2, y2)
    fn sum(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> u64 {
        let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
        let at = |x: usize, y: usize| self.sums[y * self.stride + x];
        at(x2, y2) + at(x1, y1) - at(x1, y2) - at(x2, y1)
    }

    fn mean(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> f64 {
        let area = ((x2 - x1 + 1) as u64 * (y2 - y1 + 1) as u64) as f64;
        self.sum(x1, y1, x2, y2) as f64 / area
    }
}
