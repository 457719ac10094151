//! Text-completion collaborator
//!
//! Correction, merging and heading detection all talk to a language model
//! through the [`TextCompletion`] trait. A `None` or empty completion is a
//! normal outcome that callers answer by keeping their input text.

mod client;
mod keys;
mod retry;

pub use client::ChatCompletionClient;
pub use keys::{Clock, Credential, KeyPool, ManualClock, Outcome, SystemClock};
pub use retry::{with_retry, RetryPolicy, Sleeper, TokioSleeper};

use crate::error::CompletionError;
use async_trait::async_trait;

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Generate a completion for one system + user prompt pair
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>, CompletionError>;
}

/// Trimmed completion text, treating blank output as absent
pub(crate) fn non_empty(output: Option<String>) -> Option<String> {
    output
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
