use crate::completion::RetryPolicy;
use crate::engine::ScriptHint;
use clap::Parser;
use std::time::Duration;

/// Engine name that disables recognition entirely
pub const ENGINE_NONE: &str = "none";

#[derive(Parser, Debug, Clone)]
#[command(name = "docscan-ocr-server")]
#[command(about = "Document-to-text extraction server")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Recognition engine ("ocrs", "leptess", or "none"); defaults to the first compiled in
    #[arg(long, env = "OCR_ENGINE")]
    pub engine: Option<String>,

    /// Language hint for recognition, '+'-separated (e.g. "ara+eng")
    #[arg(long, env = "OCR_LANGUAGES", default_value = "ara+eng")]
    pub languages: String,

    /// Path to tessdata directory (downloaded to the cache dir if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Base URL of an OpenAI-compatible chat completions API
    #[arg(long, env = "OCR_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    /// Comma-separated API keys; leave empty to disable text correction
    #[arg(long, env = "OCR_LLM_API_KEYS", default_value = "")]
    pub llm_api_keys: String,

    /// Model used for correction, merging and heading detection
    #[arg(long, env = "OCR_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// Per-request timeout for completion calls, in seconds
    #[arg(long, env = "OCR_LLM_TIMEOUT_SECS", default_value = "60")]
    pub llm_timeout_secs: u64,

    /// Retries after a failed completion call
    #[arg(long, env = "OCR_LLM_MAX_RETRIES", default_value = "3")]
    pub llm_max_retries: u32,

    /// Base backoff between retries in milliseconds (doubles per retry)
    #[arg(long, env = "OCR_LLM_RETRY_BACKOFF_MS", default_value = "1000")]
    pub llm_retry_backoff_ms: u64,

    /// How long a rate-limited key is rested, in seconds
    #[arg(long, env = "OCR_KEY_COOLDOWN_SECS", default_value = "60")]
    pub key_cooldown_secs: u64,

    /// Merge chunks processed concurrently (1 = sequential)
    #[arg(long, env = "OCR_MERGE_CONCURRENCY", default_value = "1")]
    pub merge_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Text-completion collaborator settings
#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_keys: Vec<String>,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub key_cooldown: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_keys", &format!("<{} redacted>", self.api_keys.len()))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("key_cooldown", &self.key_cooldown)
            .finish()
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub engine: Option<String>,
    pub script_hint: ScriptHint,
    pub tessdata_path: Option<String>,
    /// `None` when no API key is configured
    pub llm: Option<LlmConfig>,
    pub merge_concurrency: usize,
}

impl Config {
    pub fn recognition_disabled(&self) -> bool {
        self.engine.as_deref() == Some(ENGINE_NONE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9292,
            max_file_size: 52_428_800,
            engine: None,
            script_hint: ScriptHint::default(),
            tessdata_path: None,
            llm: None,
            merge_concurrency: 1,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let api_keys = parse_keys(&args.llm_api_keys);
        let llm = (!api_keys.is_empty()).then(|| LlmConfig {
            base_url: args.llm_base_url.trim_end_matches('/').to_string(),
            api_keys,
            model: args.llm_model,
            timeout: Duration::from_secs(args.llm_timeout_secs),
            retry: RetryPolicy {
                max_retries: args.llm_max_retries,
                base_backoff: Duration::from_millis(args.llm_retry_backoff_ms),
            },
            key_cooldown: Duration::from_secs(args.key_cooldown_secs),
        });

        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            engine: args.engine.map(|e| e.to_lowercase()),
            script_hint: ScriptHint::parse(&args.languages),
            tessdata_path: args.tessdata_path,
            llm,
            merge_concurrency: args.merge_concurrency.max(1),
        }
    }
}

fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
