use crate::buffer::{self, PixelBuffer};
use crate::error::OcrError;
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Which parameter set a preprocessing run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessAttempt {
    /// Balanced parameters for ordinary scans and photos
    #[default]
    First,
    /// Larger windows and kernels for faint or broken text
    Second,
}

impl PreprocessAttempt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
        }
    }
}

/// Tunable parameters selected by [`PreprocessAttempt`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptParams {
    pub contrast_multiplier: f32,
    pub block_size: u32,
    pub threshold_c: f64,
    pub close_kernel: u32,
    pub open_kernel: u32,
}

impl AttemptParams {
    pub fn for_attempt(attempt: PreprocessAttempt) -> Self {
        match attempt {
            PreprocessAttempt::First => Self {
                contrast_multiplier: 1.3,
                block_size: 21,
                threshold_c: 8.0,
                close_kernel: 3,
                open_kernel: 2,
            },
            PreprocessAttempt::Second => Self {
                contrast_multiplier: 1.5,
                block_size: 31,
                threshold_c: 12.0,
                close_kernel: 5,
                open_kernel: 3,
            },
        }
    }
}

/// How much of the sequence produced the output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    /// Every stage ran
    Full,
    /// Grayscale, normalize and sharpen only
    Minimal,
    /// Grayscale conversion only
    GrayscaleOnly,
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub buffer: PixelBuffer,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    pub attempt: PreprocessAttempt,
    pub tier: FallbackTier,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Anything that can turn raw upload bytes into a recognition-ready buffer
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, raw: &[u8], attempt: PreprocessAttempt)
        -> Result<PixelBuffer, OcrError>;
}

/// Preprocessing pipeline: grayscale → normalize → contrast → denoise →
/// sharpen → upscale → deskew → threshold → close → open
#[derive(Debug, Clone)]
pub struct PreprocessPipeline {
    first: AttemptParams,
    second: AttemptParams,
}

impl Default for PreprocessPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessPipeline {
    pub fn new() -> Self {
        Self::with_params(
            AttemptParams::for_attempt(PreprocessAttempt::First),
            AttemptParams::for_attempt(PreprocessAttempt::Second),
        )
    }

    pub fn with_params(first: AttemptParams, second: AttemptParams) -> Self {
        Self { first, second }
    }

    pub fn params(&self, attempt: PreprocessAttempt) -> AttemptParams {
        match attempt {
            PreprocessAttempt::First => self.first,
            PreprocessAttempt::Second => self.second,
        }
    }

    /// Decode and preprocess `raw`.
    ///
    /// Only a decode failure is returned as an error. Once a buffer exists,
    /// a failing stage drops down to the minimal sequence, then to grayscale
    /// alone.
    pub fn run(
        &self,
        raw: &[u8],
        attempt: PreprocessAttempt,
    ) -> Result<PreprocessingResult, OcrError> {
        let start = Instant::now();
        let mut timings = Vec::new();

        let decoded = self.run_step("decode", raw, &mut timings, buffer::decode)?;

        let (output, tier) = match self.full(decoded.clone(), attempt, &mut timings) {
            Ok(output) => (output, FallbackTier::Full),
            Err(e) => {
                tracing::warn!(
                    "Preprocessing ({} attempt) failed, using minimal sequence: {}",
                    attempt.as_str(),
                    e
                );
                match self.minimal(decoded.clone(), &mut timings) {
                    Ok(output) => (output, FallbackTier::Minimal),
                    Err(e) => {
                        tracing::warn!("Minimal preprocessing failed, using grayscale: {}", e);
                        (steps::grayscale::convert(decoded), FallbackTier::GrayscaleOnly)
                    }
                }
            }
        };

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Preprocessed {}x{} image ({} attempt, {:?}) in {}ms",
            output.width(),
            output.height(),
            attempt.as_str(),
            tier,
            total_time_ms
        );

        Ok(PreprocessingResult {
            buffer: output,
            total_time_ms,
            attempt,
            tier,
            steps: timings,
        })
    }

    fn full(
        &self,
        img: PixelBuffer,
        attempt: PreprocessAttempt,
        timings: &mut Vec<StepTiming>,
    ) -> Result<PixelBuffer, OcrError> {
        let params = self.params(attempt);

        let img = self.run_step("grayscale", img, timings, steps::grayscale::apply)?;
        let img = self.run_step("normalize", img, timings, steps::normalize::apply)?;
        let img = self.run_step("contrast", img, timings, |b| {
            steps::contrast::apply(b, params.contrast_multiplier)
        })?;
        let img = self.run_step("denoise", img, timings, steps::denoise::apply)?;
        let img = self.run_step("sharpen", img, timings, steps::sharpen::apply)?;
        let img = self.run_step("resize", img, timings, steps::resize::apply)?;
        let img = self.run_step("deskew", img, timings, steps::deskew::apply)?;
        let img = self.run_step("threshold", img, timings, |b| {
            steps::threshold::apply(b, params.block_size, params.threshold_c)
        })?;
        let img = self.run_step("close", img, timings, |b| {
            steps::morphology::close(&b, params.close_kernel)
        })?;
        self.run_step("open", img, timings, |b| {
            steps::morphology::open(&b, params.open_kernel)
        })
    }

    fn minimal(
        &self,
        img: PixelBuffer,
        timings: &mut Vec<StepTiming>,
    ) -> Result<PixelBuffer, OcrError> {
        let img = self.run_step("grayscale", img, timings, steps::grayscale::apply)?;
        let img = self.run_step("normalize", img, timings, steps::normalize::apply)?;
        self.run_step("sharpen", img, timings, steps::sharpen::apply)
    }

    fn run_step<I, F>(
        &self,
        name: &str,
        input: I,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<PixelBuffer, OcrError>
    where
        F: FnOnce(I) -> Result<PixelBuffer, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(input)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}

impl Preprocessor for PreprocessPipeline {
    fn preprocess(
        &self,
        raw: &[u8],
        attempt: PreprocessAttempt,
    ) -> Result<PixelBuffer, OcrError> {
        self.run(raw, attempt).map(|result| result.buffer)
    }
}
