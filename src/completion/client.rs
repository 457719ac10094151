//! OpenAI-compatible chat completions client

use super::keys::{Credential, KeyPool, Outcome};
use super::retry::{with_retry, RetryPolicy, Sleeper, TokioSleeper};
use super::TextCompletion;
use crate::config::LlmConfig;
use crate::error::{CompletionError, OcrError};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct ChatCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    keys: Arc<KeyPool>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    max_key_wait: Duration,
}

impl ChatCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OcrError> {
        let keys = Arc::new(KeyPool::new(config.api_keys.clone(), config.key_cooldown));
        Self::new(
            &config.base_url,
            &config.model,
            config.timeout,
            keys,
            config.retry,
            Arc::new(TokioSleeper),
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Duration,
        keys: Arc<KeyPool>,
        retry: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OcrError::InitializationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            keys,
            retry,
            sleeper,
            max_key_wait: timeout,
        })
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<Option<String>, CompletionError> {
        let Some(credential) = self.keys.acquire() else {
            return Err(self.no_key_error());
        };
        let result = self.send(&credential, request).await;

        match &result {
            Ok(_) => self.keys.report_outcome(&credential, Outcome::Success),
            Err(CompletionError::RateLimited { retry_after }) => {
                self.keys.report_rate_limited(&credential, *retry_after)
            }
            Err(e) => {
                if let Some(kind) = e.failure_kind() {
                    self.keys.report_outcome(&credential, Outcome::Failure(kind));
                }
            }
        }
        result
    }

    /// Every key is resting: ask the retry loop to wait for the earliest one,
    /// unless none will come back within one request's timeout.
    fn no_key_error(&self) -> CompletionError {
        match self.keys.next_available_in() {
            Some(wait) if wait <= self.max_key_wait => CompletionError::RateLimited {
                retry_after: Some(wait),
            },
            _ => CompletionError::NoCredential,
        }
    }

    async fn send(
        &self,
        credential: &Credential,
        request: &ChatRequest<'_>,
    ) -> Result<Option<String>, CompletionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(CompletionError::RateLimited { retry_after });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CompletionError::Unauthorized(status.to_string()));
        }
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return Err(CompletionError::Transient(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::InvalidResponse(format!(
                "{}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl TextCompletion for ChatCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Option<String>, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens,
            temperature,
        };

        let output = with_retry(&self.retry, self.sleeper.as_ref(), |_| {
            self.attempt(&request)
        })
        .await?;

        Ok(super::non_empty(output))
    }
}
