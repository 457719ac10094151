//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine with Arabic and Latin support.
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) for every hinted language on first use.

use super::download::{cache_dir, ensure_downloaded};
use crate::buffer::{self, PixelBuffer};
use crate::engine::{RecognitionEngine, ScriptHint};
use crate::error::OcrError;
use image::ImageFormat;
use tesseract_static::tesseract::Tesseract;

/// Tesseract OCR Engine
pub struct LeptessEngine {
    /// Path to tessdata directory
    tessdata_path: String,
}

impl LeptessEngine {
    /// Create a Tesseract-based engine able to read every language in `hint`
    pub fn new(tessdata_path: Option<&str>, hint: &ScriptHint) -> Result<Self, OcrError> {
        let tessdata_path = match tessdata_path {
            Some(path) => path.to_string(),
            None => ensure_tessdata_available(hint)?,
        };
        let language = hint.to_string();

        // Validate that tessdata is accessible by doing a test initialization
        let test_tess = Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(test_tess);

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, languages: {})",
            tessdata_path,
            language
        );

        Ok(Self { tessdata_path })
    }
}

impl RecognitionEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - Arabic and Latin scripts, tolerant of noisy photos"
    }

    fn recognize(&self, image: &PixelBuffer, hint: &ScriptHint) -> Result<String, OcrError> {
        let (width, height) = image.dimensions();

        // BMP is always supported by leptonica
        let bmp_data = buffer::encode(image, ImageFormat::Bmp)?;

        tracing::debug!(
            "Recognizing {}x{} image ({}), BMP size: {} bytes",
            width,
            height,
            hint,
            bmp_data.len()
        );

        let language = hint.to_string();
        let mut tess = Tesseract::new(Some(&self.tessdata_path), Some(&language))
            .map_err(|e| OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e)))?;

        tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            OcrError::ProcessingError(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        tess = tess
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;

        Ok(text.trim().to_string())
    }

    fn supported_languages(&self) -> Vec<String> {
        vec![
            "ara".to_string(), // Arabic
            "eng".to_string(), // English
            "fra".to_string(), // French
            "deu".to_string(), // German
            "spa".to_string(), // Spanish
        ]
    }
}

/// Ensure tessdata for every hinted language is cached, returning the directory
fn ensure_tessdata_available(hint: &ScriptHint) -> Result<String, OcrError> {
    let dir = cache_dir(Some("tessdata"))?;

    for language in hint.languages() {
        ensure_downloaded(
            &tessdata_url(language),
            &dir,
            &format!("{}.traineddata", language),
        )?;
    }

    // Tesseract expects the directory, not the file
    dir.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
