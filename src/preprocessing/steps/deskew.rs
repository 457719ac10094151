use crate::buffer::{self, PixelBuffer};
use crate::error::OcrError;

/// Candidate skew angles in degrees, searched in ascending order
const MIN_ANGLE: i32 = -5;
const MAX_ANGLE: i32 = 5;
/// Rotations smaller than this are not worth the resampling artifacts
pub const MIN_CORRECTION_DEGREES: f32 = 0.5;
/// Pixels below this value count as ink
const DARK_THRESHOLD: u8 = 128;
const BACKGROUND: u8 = 255;

/// Deskew image by detecting and correcting rotation
pub fn apply(buffer: PixelBuffer) -> Result<PixelBuffer, OcrError> {
    let angle = estimate(&buffer);

    if angle.abs() < MIN_CORRECTION_DEGREES {
        return Ok(buffer);
    }

    tracing::debug!("Correcting skew of {} degrees", angle);
    buffer::rotate(&buffer, -angle, BACKGROUND)
}

/// Estimate document rotation in degrees, within [-5, 5].
///
/// Each integer candidate is undone on a copy of the image and the
/// horizontal projection profile is scored by its variance: level text lines
/// give sharply alternating ink and gap rows. The highest-scoring candidate
/// wins, earlier (smaller) candidates win ties, and any failure yields 0.
pub fn estimate(buffer: &PixelBuffer) -> f32 {
    match try_estimate(buffer) {
        Ok(angle) => angle,
        Err(e) => {
            tracing::warn!("Skew estimation failed, assuming no skew: {}", e);
            0.0
        }
    }
}

fn try_estimate(buffer: &PixelBuffer) -> Result<f32, OcrError> {
    if buffer.is_empty() {
        return Ok(0.0);
    }

    let mut best_angle = 0;
    let mut best_variance = 0.0_f64;

    for candidate in MIN_ANGLE..=MAX_ANGLE {
        let rotated = buffer::rotate(buffer, -(candidate as f32), BACKGROUND)?;
        let variance = projection_variance(&rotated);
        if variance > best_variance {
            best_variance = variance;
            best_angle = candidate;
        }
    }

    Ok(best_angle as f32)
}

/// Variance of the per-row dark pixel counts
fn projection_variance(buffer: &PixelBuffer) -> f64 {
    let (width, height) = buffer.dimensions();
    let row_counts: Vec<u32> = (0..height)
        .map(|y| {
            (0..width)
                .filter(|&x| buffer.luma(x, y) < DARK_THRESHOLD)
                .count() as u32
        })
        .collect();

    let n = row_counts.len() as f64;
    let mean = row_counts.iter().map(|&c| c as f64).sum::<f64>() / n;
    row_counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / n
}
