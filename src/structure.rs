//! Heading detection: plain text into titled sections

use crate::completion::{non_empty, TextCompletion};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Texts shorter than this are wrapped in a single section
pub const MIN_STRUCTURE_CHARS: usize = 100;
/// Only this much text is sent for analysis
pub const ANALYSIS_WINDOW_CHARS: usize = 8000;

const STRUCTURE_MAX_TOKENS: u32 = 8192;
const STRUCTURE_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Main,
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    #[serde(rename = "type", alias = "kind")]
    pub kind: SectionKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredDocument {
    pub sections: Vec<DocumentSection>,
    pub plain_text: String,
}

impl StructuredDocument {
    /// Whole text as one untitled main section
    pub fn single(text: &str) -> Self {
        Self::from_sections(vec![DocumentSection {
            kind: SectionKind::Main,
            title: String::new(),
            content: text.to_string(),
        }])
    }

    /// Build from sections, flattening titles and content in order
    pub fn from_sections(sections: Vec<DocumentSection>) -> Self {
        let plain_text = sections
            .iter()
            .flat_map(|s| [s.title.trim(), s.content.trim()])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            sections,
            plain_text,
        }
    }
}

pub struct StructureDetector {
    completion: Option<Arc<dyn TextCompletion>>,
}

impl StructureDetector {
    pub fn new(completion: Option<Arc<dyn TextCompletion>>) -> Self {
        Self { completion }
    }

    pub async fn detect_headings(&self, raw_text: &str) -> StructuredDocument {
        let Some(completion) = &self.completion else {
            return StructuredDocument::single(raw_text);
        };
        if raw_text.chars().count() < MIN_STRUCTURE_CHARS {
            return StructuredDocument::single(raw_text);
        }

        let (window, tail) = split_at_char(raw_text, ANALYSIS_WINDOW_CHARS);
        let prompt = prompts::headings_user_prompt(window);
        let response = match completion
            .complete(
                prompts::HEADINGS_SYSTEM_PROMPT,
                &prompt,
                STRUCTURE_MAX_TOKENS,
                STRUCTURE_TEMPERATURE,
            )
            .await
        {
            Ok(output) => non_empty(output),
            Err(e) => {
                tracing::warn!("Heading detection failed: {}", e);
                None
            }
        };

        let Some(mut sections) = response.as_deref().and_then(extract_sections) else {
            tracing::debug!("No usable section list, keeping text as one section");
            return StructuredDocument::single(raw_text);
        };

        // Text past the analysis window still belongs to the document
        if !tail.trim().is_empty() {
            if let Some(last) = sections.last_mut() {
                last.content.push_str(tail);
            }
        }

        tracing::info!("Detected {} sections", sections.len());
        StructuredDocument::from_sections(sections)
    }
}

/// First JSON array in `response` that parses as a non-empty section list
fn extract_sections(response: &str) -> Option<Vec<DocumentSection>> {
    response
        .match_indices('[')
        .filter_map(|(start, _)| {
            serde_json::Deserializer::from_str(&response[start..])
                .into_iter::<Vec<DocumentSection>>()
                .next()?
                .ok()
        })
        .find(|sections| !sections.is_empty())
}

fn split_at_char(text: &str, chars: usize) -> (&str, &str) {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => text.split_at(idx),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedCompletion {
        response: Option<String>,
        seen_prompt: Mutex<Option<String>>,
    }

    impl CannedCompletion {
        fn new(response: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map(str::to_string),
                seen_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for CannedCompletion {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<Option<String>, CompletionError> {
            *self.seen_prompt.lock().unwrap() = Some(user.to_string());
            Ok(self.response.clone())
        }
    }

    fn document_text() -> String {
        "Introduction\nThis report covers the quarterly results for all regions. \
         Revenue\nRevenue grew steadily across the period with strong demand."
            .to_string()
    }

    #[tokio::test]
    async fn test_parses_array_wrapped_in_prose() {
        let response = r#"Sure! Here are the sections:
[{"type": "main", "title": "Introduction", "content": "This report covers the quarterly results."},
 {"type": "sub", "title": "Revenue", "content": "Revenue grew steadily."}]
Let me know if you need anything else [really]."#;
        let detector = StructureDetector::new(Some(CannedCompletion::new(Some(response))));

        let doc = detector.detect_headings(&document_text()).await;

        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[1].kind, SectionKind::Sub);
        assert_eq!(
            doc.plain_text,
            "Introduction\n\nThis report covers the quarterly results.\n\nRevenue\n\nRevenue grew steadily."
        );
    }

    #[tokio::test]
    async fn test_malformed_json_falls_back_to_single_section() {
        let detector =
            StructureDetector::new(Some(CannedCompletion::new(Some("[{\"type\": \"main\", oops"))));
        let text = document_text();

        let doc = detector.detect_headings(&text).await;

        assert_eq!(doc, StructuredDocument::single(&text));
    }

    #[tokio::test]
    async fn test_empty_response_falls_back() {
        let detector = StructureDetector::new(Some(CannedCompletion::new(None)));
        let text = document_text();

        let doc = detector.detect_headings(&text).await;

        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.plain_text, text.trim());
    }

    #[tokio::test]
    async fn test_short_text_skips_collaborator() {
        let completion = CannedCompletion::new(Some("[]"));
        let detector = StructureDetector::new(Some(completion.clone()));

        let doc = detector.detect_headings("Just a line.").await;

        assert_eq!(doc.sections[0].kind, SectionKind::Main);
        assert_eq!(doc.plain_text, "Just a line.");
        assert!(completion.seen_prompt.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_long_text_is_truncated_and_tail_kept() {
        let response = r#"[{"type": "main", "title": "Body", "content": "start"}]"#;
        let completion = CannedCompletion::new(Some(response));
        let detector = StructureDetector::new(Some(completion.clone()));
        let text = format!("{}{}", "a".repeat(ANALYSIS_WINDOW_CHARS), " trailing words");

        let doc = detector.detect_headings(&text).await;

        let prompt = completion.seen_prompt.lock().unwrap().clone().unwrap();
        assert!(!prompt.contains("trailing"));
        assert_eq!(doc.sections[0].content, "start trailing words");
    }

    #[test]
    fn test_extract_skips_non_section_arrays() {
        let sections = extract_sections(r#"[1, 2] then [{"type":"main","title":"T","content":"C"}]"#)
            .unwrap();
        assert_eq!(sections[0].title, "T");
        assert!(extract_sections("no json here").is_none());
    }
}
