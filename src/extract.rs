//! End-to-end extraction of one upload
//!
//! Images go through preprocessing, recognition and correction. PDFs use
//! their text layer when it has one, otherwise their embedded images are
//! recognized page by page; either way the page texts are merged, and can be
//! split into sections on request. Plain text is passed through.

use crate::completion::{ChatCompletionClient, TextCompletion};
use crate::config::Config;
use crate::correction::TextCorrector;
use crate::document::{pdf, DocumentKind};
use crate::engines;
use crate::error::OcrError;
use crate::merge::DocumentMerger;
use crate::notice::ExtractionNotice;
use crate::preprocessing::PreprocessAttempt;
use crate::recognition::RecognitionAdapter;
use crate::structure::{DocumentSection, StructureDetector};
use serde::Serialize;
use std::sync::Arc;

/// A text layer this short is treated as absent (scanned PDF)
pub const MIN_TEXT_LAYER_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionOutcome {
    /// Extracted text, or the notice message when there is none
    pub text: String,
    pub kind: DocumentKind,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<PreprocessAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<DocumentSection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<ExtractionNotice>,
}

impl ExtractionOutcome {
    fn text(kind: DocumentKind, page_count: usize, text: String) -> Self {
        Self {
            text,
            kind,
            page_count,
            attempt: None,
            sections: None,
            notice: None,
        }
    }

    fn notice(kind: DocumentKind, page_count: usize, notice: ExtractionNotice) -> Self {
        Self {
            notice: Some(notice),
            ..Self::text(kind, page_count, notice.message().to_string())
        }
    }
}

/// What the blocking half of PDF handling found
enum PdfText {
    Layer { text: String, pages: usize },
    Scanned { text: String, pages: usize, images: usize, attempt: PreprocessAttempt },
    Missing { pages: usize, notice: ExtractionNotice },
}

pub struct Extractor {
    recognizer: Option<Arc<RecognitionAdapter>>,
    completion_configured: bool,
    corrector: TextCorrector,
    merger: DocumentMerger,
    structure: StructureDetector,
}

impl Extractor {
    pub fn new(
        recognizer: Option<Arc<RecognitionAdapter>>,
        completion: Option<Arc<dyn TextCompletion>>,
        merge_concurrency: usize,
    ) -> Self {
        Self {
            recognizer,
            completion_configured: completion.is_some(),
            corrector: TextCorrector::new(completion.clone()),
            merger: DocumentMerger::new(completion.clone()).with_concurrency(merge_concurrency),
            structure: StructureDetector::new(completion),
        }
    }

    /// Initialize the recognition engine and completion client from config
    pub fn from_config(config: &Config) -> Result<Self, OcrError> {
        let recognizer = engines::select(config)?
            .map(|engine| Arc::new(RecognitionAdapter::new(engine, config.script_hint.clone())));

        let completion = match &config.llm {
            Some(llm) => {
                tracing::info!("Text completion enabled: {:?}", llm);
                let client: Arc<dyn TextCompletion> = Arc::new(ChatCompletionClient::from_config(llm)?);
                Some(client)
            }
            None => {
                tracing::info!("No completion API keys configured, text stages are passthrough");
                None
            }
        };

        Ok(Self::new(recognizer, completion, config.merge_concurrency))
    }

    pub fn recognizer(&self) -> Option<&RecognitionAdapter> {
        self.recognizer.as_deref()
    }

    pub fn completion_configured(&self) -> bool {
        self.completion_configured
    }

    pub async fn extract(
        &self,
        data: Vec<u8>,
        content_type: Option<&str>,
        with_structure: bool,
    ) -> ExtractionOutcome {
        let kind = DocumentKind::detect(&data, content_type);
        tracing::info!(
            "Extracting {} bytes as {} (content type: {})",
            data.len(),
            kind.as_str(),
            content_type.unwrap_or("none")
        );

        match kind {
            DocumentKind::Image => self.extract_image(data).await,
            DocumentKind::Pdf => self.extract_pdf(data, with_structure).await,
            DocumentKind::PlainText => {
                let text = String::from_utf8_lossy(&data).trim().to_string();
                self.finish(ExtractionOutcome::text(kind, 1, text), with_structure)
                    .await
            }
            DocumentKind::Unsupported => {
                ExtractionOutcome::notice(kind, 0, ExtractionNotice::UnsupportedFileType)
            }
        }
    }

    async fn extract_image(&self, data: Vec<u8>) -> ExtractionOutcome {
        let kind = DocumentKind::Image;
        let Some(recognizer) = self.recognizer.clone() else {
            tracing::warn!("Image upload received but recognition is disabled");
            return ExtractionOutcome::notice(kind, 1, ExtractionNotice::ExtractionFailed);
        };

        let recognized =
            tokio::task::spawn_blocking(move || recognizer.try_recognize(&data)).await;

        match recognized {
            Ok(Ok(Some(result))) => {
                let text = self.corrector.correct(&result.text).await;
                ExtractionOutcome {
                    attempt: Some(result.attempt_used),
                    ..ExtractionOutcome::text(kind, 1, text)
                }
            }
            Ok(Ok(None)) => ExtractionOutcome::notice(kind, 1, ExtractionNotice::NoTextFound),
            Ok(Err(e)) => {
                tracing::warn!("Recognition failed: {}", e);
                ExtractionOutcome::notice(kind, 1, ExtractionNotice::ExtractionFailed)
            }
            Err(e) => {
                tracing::error!("Recognition task failed: {}", e);
                ExtractionOutcome::notice(kind, 1, ExtractionNotice::ExtractionFailed)
            }
        }
    }

    async fn extract_pdf(&self, data: Vec<u8>, with_structure: bool) -> ExtractionOutcome {
        let kind = DocumentKind::Pdf;
        let recognizer = self.recognizer.clone();
        let read = tokio::task::spawn_blocking(move || read_pdf(&data, recognizer.as_deref())).await;

        let (text, pages, merge_pages, attempt) = match read {
            Ok(Ok(PdfText::Layer { text, pages })) => (text, pages, pages, None),
            Ok(Ok(PdfText::Scanned {
                text,
                pages,
                images,
                attempt,
            })) => (text, pages, images, Some(attempt)),
            Ok(Ok(PdfText::Missing { pages, notice })) => {
                return ExtractionOutcome::notice(kind, pages, notice)
            }
            Ok(Err(e)) => {
                tracing::warn!("PDF extraction failed: {}", e);
                return ExtractionOutcome::notice(kind, 0, ExtractionNotice::ExtractionFailed);
            }
            Err(e) => {
                tracing::error!("PDF extraction task failed: {}", e);
                return ExtractionOutcome::notice(kind, 0, ExtractionNotice::ExtractionFailed);
            }
        };

        let merged = self.merger.merge(&text, merge_pages).await;
        let outcome = ExtractionOutcome {
            attempt,
            ..ExtractionOutcome::text(kind, pages, merged)
        };
        self.finish(outcome, with_structure).await
    }

    /// With structure requested, `text` becomes the flattened section text so
    /// it always agrees with `sections`.
    async fn finish(&self, mut outcome: ExtractionOutcome, with_structure: bool) -> ExtractionOutcome {
        if with_structure {
            let document = self.structure.detect_headings(&outcome.text).await;
            if !document.plain_text.is_empty() {
                outcome.text = document.plain_text;
            }
            outcome.sections = Some(document.sections);
        }
        outcome
    }
}

fn read_pdf(data: &[u8], recognizer: Option<&RecognitionAdapter>) -> Result<PdfText, OcrError> {
    let doc = pdf::load(data)?;
    let pages = pdf::page_count(&doc);

    let layer = pdf::extract_text(data).unwrap_or_else(|e| {
        tracing::warn!("Could not read PDF text layer: {}", e);
        String::new()
    });
    let layer = layer.trim();
    if layer.chars().count() > MIN_TEXT_LAYER_CHARS {
        tracing::info!(
            "Extracted {} chars of text from {} PDF pages",
            layer.chars().count(),
            pages
        );
        return Ok(PdfText::Layer {
            text: layer.to_string(),
            pages,
        });
    }

    let Some(recognizer) = recognizer else {
        tracing::warn!("PDF has no text layer and recognition is disabled");
        return Ok(PdfText::Missing {
            pages,
            notice: ExtractionNotice::ExtractionFailed,
        });
    };

    tracing::info!("PDF has no usable text layer, recognizing embedded images");
    let images = pdf::extract_images(&doc);
    match recognize_pages(recognizer, &images) {
        Some((text, attempt)) => Ok(PdfText::Scanned {
            text,
            pages,
            images: images.len(),
            attempt,
        }),
        None => Ok(PdfText::Missing {
            pages,
            notice: ExtractionNotice::NoTextFound,
        }),
    }
}

/// Recognize each page image in order, joining the readable ones.
///
/// The attempt reported is the most aggressive one any page needed.
fn recognize_pages(
    recognizer: &RecognitionAdapter,
    images: &[Vec<u8>],
) -> Option<(String, PreprocessAttempt)> {
    let mut texts = Vec::new();
    let mut attempt = PreprocessAttempt::First;

    for (i, image) in images.iter().enumerate() {
        tracing::info!("Recognizing image {} of {} from PDF", i + 1, images.len());
        match recognizer.try_recognize(image) {
            Ok(Some(result)) => {
                if result.attempt_used == PreprocessAttempt::Second {
                    attempt = PreprocessAttempt::Second;
                }
                texts.push(result.text);
            }
            Ok(None) => tracing::debug!("No text on image {}", i + 1),
            Err(e) => tracing::warn!("Failed to recognize image {}: {}", i + 1, e),
        }
    }

    if texts.is_empty() {
        None
    } else {
        Some((texts.join("\n\n"), attempt))
    }
}
