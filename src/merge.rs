//! Cross-page repair of multi-page text
//!
//! Page-by-page extraction splits sentences at page breaks and repeats
//! headers, footers and page numbers. The merger sends the text to the
//! completion collaborator, in bounded chunks when it is long, and keeps the
//! raw text for any piece the collaborator fails on.

use crate::completion::{non_empty, TextCompletion};
use crate::prompts;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Texts shorter than this are returned untouched
pub const MIN_MERGE_CHARS: usize = 50;
/// Longest text sent in one request; longer text is chunked
pub const CHUNK_CHARS: usize = 6000;

const MERGE_MAX_TOKENS: u32 = 8192;
const MERGE_TEMPERATURE: f32 = 0.1;

/// Characters after which a chunk may end
const BREAK_CHARS: &[char] = &['\n', '.', '!', '?', '؟', '۔'];

/// A slice of a larger document's raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub is_first: bool,
    pub is_last: bool,
}

/// Split `text` into chunks of at most `chunk_chars` characters.
///
/// A chunk that would end mid-text instead ends just after the last
/// sentence or line break in its second half, when there is one.
/// Concatenating the chunks reproduces `text` exactly.
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<TextChunk> {
    let chunk_chars = chunk_chars.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((end, _)) = rest.char_indices().nth(chunk_chars) else {
            pieces.push(rest);
            break;
        };

        let mid = rest
            .char_indices()
            .nth(chunk_chars / 2)
            .map_or(0, |(idx, _)| idx);
        let cut = rest[mid..end]
            .rfind(BREAK_CHARS)
            .map(|pos| {
                let break_len = rest[mid + pos..].chars().next().map_or(1, char::len_utf8);
                mid + pos + break_len
            })
            .unwrap_or(end);

        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece);
        rest = tail;
    }

    let count = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| TextChunk {
            content: content.to_string(),
            is_first: i == 0,
            is_last: i + 1 == count,
        })
        .collect()
}

pub struct DocumentMerger {
    completion: Option<Arc<dyn TextCompletion>>,
    concurrency: usize,
}

impl DocumentMerger {
    pub fn new(completion: Option<Arc<dyn TextCompletion>>) -> Self {
        Self {
            completion,
            concurrency: 1,
        }
    }

    /// Process up to `concurrency` chunks at once; output order is unaffected
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn merge(&self, raw_text: &str, page_count: usize) -> String {
        let Some(completion) = &self.completion else {
            return raw_text.to_string();
        };
        let chars = raw_text.chars().count();
        if chars < MIN_MERGE_CHARS {
            return raw_text.to_string();
        }

        if chars < CHUNK_CHARS {
            let prompt = prompts::merge_user_prompt(raw_text, page_count);
            return match completion
                .complete(prompts::MERGE_SYSTEM_PROMPT, &prompt, MERGE_MAX_TOKENS, MERGE_TEMPERATURE)
                .await
            {
                Ok(output) => non_empty(output).unwrap_or_else(|| raw_text.to_string()),
                Err(e) => {
                    tracing::warn!("Merge failed, keeping raw text: {}", e);
                    raw_text.to_string()
                }
            };
        }

        let chunks = split_chunks(raw_text, CHUNK_CHARS);
        let total = chunks.len();
        tracing::info!(
            "Merging {} chars from {} pages in {} chunks",
            chars,
            page_count,
            total
        );

        let merged: Vec<String> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| {
                let completion = completion.clone();
                async move { merge_chunk(completion.as_ref(), chunk, index, total, page_count).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        merged.join("\n\n")
    }
}

/// Merged text of one chunk, or the chunk's raw text exactly as split when
/// the completion fails or comes back empty
async fn merge_chunk(
    completion: &dyn TextCompletion,
    chunk: TextChunk,
    index: usize,
    total: usize,
    page_count: usize,
) -> String {
    let prompt = prompts::merge_chunk_user_prompt(&chunk, page_count);
    match completion
        .complete(prompts::MERGE_SYSTEM_PROMPT, &prompt, MERGE_MAX_TOKENS, MERGE_TEMPERATURE)
        .await
    {
        Ok(output) => non_empty(output).unwrap_or_else(|| {
            tracing::warn!("Chunk {}/{} came back empty, keeping raw text", index + 1, total);
            chunk.content.clone()
        }),
        Err(e) => {
            tracing::warn!(
                "Chunk {}/{} failed, keeping raw text: {}",
                index + 1,
                total,
                e
            );
            chunk.content
        }
    }
}
