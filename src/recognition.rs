//! Recognition with one retry on more aggressive preprocessing

use crate::engine::{RecognitionEngine, ScriptHint};
use crate::error::OcrError;
use crate::notice::ExtractionNotice;
use crate::preprocessing::{PreprocessAttempt, PreprocessPipeline, Preprocessor};
use serde::Serialize;
use std::sync::Arc;

/// Shorter output counts as a failed attempt
pub const MIN_TEXT_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    pub text: String,
    pub attempt_used: PreprocessAttempt,
}

pub struct RecognitionAdapter {
    preprocessor: Arc<dyn Preprocessor>,
    engine: Arc<dyn RecognitionEngine>,
    hint: ScriptHint,
}

impl RecognitionAdapter {
    pub fn new(engine: Arc<dyn RecognitionEngine>, hint: ScriptHint) -> Self {
        Self::with_preprocessor(Arc::new(PreprocessPipeline::new()), engine, hint)
    }

    pub fn with_preprocessor(
        preprocessor: Arc<dyn Preprocessor>,
        engine: Arc<dyn RecognitionEngine>,
        hint: ScriptHint,
    ) -> Self {
        Self {
            preprocessor,
            engine,
            hint,
        }
    }

    pub fn engine(&self) -> &dyn RecognitionEngine {
        self.engine.as_ref()
    }

    pub fn hint(&self) -> &ScriptHint {
        &self.hint
    }

    /// Recognize `raw`, retrying once with the second parameter set.
    ///
    /// `Ok(None)` means both attempts produced too little text.
    pub fn try_recognize(&self, raw: &[u8]) -> Result<Option<RecognitionResult>, OcrError> {
        for attempt in [PreprocessAttempt::First, PreprocessAttempt::Second] {
            let buffer = self.preprocessor.preprocess(raw, attempt)?;
            let text = self.engine.recognize(&buffer, &self.hint)?;
            let text = text.trim();
            let chars = text.chars().count();

            if chars >= MIN_TEXT_CHARS {
                tracing::info!(
                    "{} recognized {} chars on the {} attempt",
                    self.engine.name(),
                    chars,
                    attempt.as_str()
                );
                return Ok(Some(RecognitionResult {
                    text: text.to_string(),
                    attempt_used: attempt,
                }));
            }

            tracing::debug!(
                "{} attempt produced {} chars, below minimum of {}",
                attempt.as_str(),
                chars,
                MIN_TEXT_CHARS
            );
        }

        Ok(None)
    }

    /// Recognized text, or a user-facing notice string; never fails
    pub fn recognize(&self, raw: &[u8]) -> String {
        match self.try_recognize(raw) {
            Ok(Some(result)) => result.text,
            Ok(None) => ExtractionNotice::NoTextFound.message().to_string(),
            Err(e) => {
                tracing::warn!("Recognition failed: {}", e);
                ExtractionNotice::ExtractionFailed.message().to_string()
            }
        }
    }
}
