use crate::buffer::PixelBuffer;
use crate::error::OcrError;
use std::fmt;

/// Language-set hint passed to the recognizer, e.g. `ara+eng`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHint {
    languages: Vec<String>,
}

impl ScriptHint {
    /// Parse a `+`-separated list of language codes
    pub fn parse(list: &str) -> Self {
        let languages = list
            .split('+')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { languages }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }
}

impl Default for ScriptHint {
    /// Arabic primary script plus Latin
    fn default() -> Self {
        Self::parse("ara+eng")
    }
}

impl fmt::Display for ScriptHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.languages.join("+"))
    }
}

/// Trait that all recognition engines must implement
///
/// Engines receive an already preprocessed (usually binary) buffer and
/// return the raw recognized text.
pub trait RecognitionEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in a preprocessed buffer
    fn recognize(&self, buffer: &PixelBuffer, hint: &ScriptHint) -> Result<String, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}
