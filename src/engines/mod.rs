//! Recognition engine implementations
//!
//! This module contains implementations of the RecognitionEngine trait for
//! different OCR backends. Engines are conditionally compiled based on feature
//! flags and one is selected at runtime by name.

mod download;

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

use crate::config::Config;
use crate::engine::{RecognitionEngine, ScriptHint};
use crate::error::OcrError;
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

/// Engines compiled into this build, in preference order
pub fn compiled_engines() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "engine-ocrs")]
    names.push("ocrs");
    #[cfg(feature = "engine-leptess")]
    names.push("leptess");
    names
}

/// Initialize the engine named in the config, or the first compiled in.
///
/// Returns `Ok(None)` when recognition is disabled with `--engine none`.
pub fn select(config: &Config) -> Result<Option<Arc<dyn RecognitionEngine>>, OcrError> {
    if config.recognition_disabled() {
        tracing::info!("Recognition disabled by configuration");
        return Ok(None);
    }

    let available = compiled_engines();
    let name = match config.engine.as_deref() {
        Some(name) => name,
        None => available.first().copied().ok_or_else(|| {
            OcrError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs or --features engine-leptess".to_string(),
            )
        })?,
    };

    tracing::info!("Initializing {} engine...", name);
    let engine = build(name, config)?;

    let unsupported = unsupported_languages(engine.as_ref(), &config.script_hint);
    if !unsupported.is_empty() {
        tracing::warn!(
            "{} engine cannot read [{}] from script hint '{}', text in those scripts will be missed",
            engine.name(),
            unsupported.join(", "),
            config.script_hint
        );
    }

    Ok(Some(engine))
}

/// Languages in `hint` that `engine` has no model for
pub fn unsupported_languages(engine: &dyn RecognitionEngine, hint: &ScriptHint) -> Vec<String> {
    let supported = engine.supported_languages();
    hint.languages()
        .iter()
        .filter(|language| !supported.contains(language))
        .cloned()
        .collect()
}

/// Describe an initialized engine
pub fn info(engine: &dyn RecognitionEngine) -> EngineInfo {
    EngineInfo {
        name: engine.name(),
        description: engine.description(),
        supported_languages: engine.supported_languages(),
    }
}

#[allow(unused_variables)]
fn build(name: &str, config: &Config) -> Result<Arc<dyn RecognitionEngine>, OcrError> {
    match name {
        #[cfg(feature = "engine-ocrs")]
        "ocrs" => Ok(Arc::new(ocrs::OcrsEngine::new()?)),
        #[cfg(feature = "engine-leptess")]
        "leptess" => Ok(Arc::new(leptess::LeptessEngine::new(
            config.tessdata_path.as_deref(),
            &config.script_hint,
        )?)),
        other => Err(OcrError::InitializationError(format!(
            "Unknown or disabled engine '{}'. Available: {}",
            other,
            compiled_engines().join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    struct LatinOnly;

    impl RecognitionEngine for LatinOnly {
        fn name(&self) -> &'static str {
            "latin"
        }

        fn description(&self) -> &'static str {
            "test engine"
        }

        fn recognize(&self, _buffer: &PixelBuffer, _hint: &ScriptHint) -> Result<String, OcrError> {
            Ok(String::new())
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["eng".to_string(), "fra".to_string()]
        }
    }

    #[test]
    fn test_unsupported_languages_in_hint() {
        assert_eq!(
            unsupported_languages(&LatinOnly, &ScriptHint::parse("ara+eng+fas")),
            vec!["ara".to_string(), "fas".to_string()]
        );
        assert!(unsupported_languages(&LatinOnly, &ScriptHint::parse("eng+fra")).is_empty());
    }

    #[test]
    fn test_engine_none_selects_nothing() {
        let config = Config {
            engine: Some("none".to_string()),
            ..Config::default()
        };
        assert!(select(&config).unwrap().is_none());
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let config = Config {
            engine: Some("abacus".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            select(&config),
            Err(OcrError::InitializationError(_))
        ));
    }
}
