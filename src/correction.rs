//! Best-effort repair of recognition artifacts

use crate::completion::{non_empty, TextCompletion};
use crate::prompts;
use std::sync::Arc;

/// Inputs shorter than this are not worth a request
pub const MIN_CORRECTION_CHARS: usize = 5;

const CORRECTION_MAX_TOKENS: u32 = 4096;
const CORRECTION_TEMPERATURE: f32 = 0.1;

pub struct TextCorrector {
    completion: Option<Arc<dyn TextCompletion>>,
}

impl TextCorrector {
    pub fn new(completion: Option<Arc<dyn TextCompletion>>) -> Self {
        Self { completion }
    }

    /// Corrected text, or `raw_text` unchanged when correction is
    /// unavailable, fails, or returns nothing
    pub async fn correct(&self, raw_text: &str) -> String {
        let Some(completion) = &self.completion else {
            return raw_text.to_string();
        };
        if raw_text.chars().count() < MIN_CORRECTION_CHARS {
            return raw_text.to_string();
        }

        let prompt = prompts::correction_user_prompt(raw_text);
        match completion
            .complete(
                prompts::CORRECTION_SYSTEM_PROMPT,
                &prompt,
                CORRECTION_MAX_TOKENS,
                CORRECTION_TEMPERATURE,
            )
            .await
        {
            Ok(output) => non_empty(output).unwrap_or_else(|| {
                tracing::debug!("Correction returned no text, keeping original");
                raw_text.to_string()
            }),
            Err(e) => {
                tracing::warn!("Correction failed, keeping original text: {}", e);
                raw_text.to_string()
            }
        }
    }
}
