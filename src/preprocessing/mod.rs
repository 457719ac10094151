//! Image preprocessing for OCR
//!
//! Turns uploaded image bytes into a clean binary mask ready for recognition.

pub mod pipeline;
pub mod steps;

pub use pipeline::{
    AttemptParams, FallbackTier, PreprocessAttempt, PreprocessPipeline, Preprocessor,
    PreprocessingResult, StepTiming,
};
