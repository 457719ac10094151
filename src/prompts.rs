//! Prompts for the text-completion collaborator.
//!
//! Every prompt lives here so the correction, merge and heading-detection
//! code only deals with chunking, fallbacks and parsing.

use crate::merge::TextChunk;

/// System prompt for repairing raw OCR output
pub const CORRECTION_SYSTEM_PROMPT: &str = r#"You repair text produced by OCR from scanned or photographed documents. The text may be Arabic, Latin-script, or a mix of both.

Rules:
1. Fix character-level recognition errors (misread letters, broken or joined words, stray symbols).
2. Restore Arabic letter joining and word spacing where OCR split or merged words.
3. Keep the original language, wording, order and line structure. Do not translate, summarize or add content.
4. If a passage is unreadable, keep it as is.
5. Return only the corrected text with no commentary."#;

/// System prompt for stitching page-separated text back together
pub const MERGE_SYSTEM_PROMPT: &str = r#"You clean up text extracted page by page from a multi-page document.

Rules:
1. Reconnect sentences and words that were split across page breaks.
2. Remove repeated page headers, footers and page numbers.
3. Keep every other sentence, in the original order and language. Do not summarize, translate or add content.
4. Return only the cleaned text with no commentary."#;

/// System prompt for segmenting text into titled sections
pub const HEADINGS_SYSTEM_PROMPT: &str = r#"You split documents into sections by finding their headings.

Return a JSON array and nothing else. Each element is an object:
{"type": "main" | "sub", "title": "<heading text>", "content": "<text under the heading>"}

Rules:
1. "main" is a top-level heading, "sub" is a heading nested under the previous main heading.
2. Copy titles and content verbatim and in order; every sentence of the input belongs to exactly one section.
3. Text before the first heading goes in a "main" section with an empty title."#;

pub fn correction_user_prompt(raw_text: &str) -> String {
    format!("Correct this OCR output:\n\n{}", raw_text)
}

/// User prompt for a whole document small enough for one request
pub fn merge_user_prompt(raw_text: &str, page_count: usize) -> String {
    format!(
        "This text was extracted from a {}-page document. Page breaks may split sentences, and headers, footers or page numbers may repeat on every page.\n\n{}",
        page_count, raw_text
    )
}

/// User prompt for one chunk of a larger document
pub fn merge_chunk_user_prompt(chunk: &TextChunk, page_count: usize) -> String {
    let position = match (chunk.is_first, chunk.is_last) {
        (true, true) => "the whole document",
        (true, false) => "the beginning of the document; it continues after this excerpt",
        (false, true) => "the end of the document; earlier text has already been processed",
        (false, false) => "a middle excerpt of the document; text continues before and after it",
    };
    format!(
        "This excerpt is {} (a {}-page document). Clean only this excerpt.\n\n{}",
        position, page_count, chunk.content
    )
}

pub fn headings_user_prompt(text: &str) -> String {
    format!("Split this document into sections:\n\n{}", text)
}
