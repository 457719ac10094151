use crate::config::Config;
use crate::document;
use crate::engines::{self, EngineInfo};
use crate::error::OcrError;
use crate::extract::{ExtractionOutcome, Extractor};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Room for multipart framing and small form fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    pub config: Arc<Config>,
}

/// Extraction response
#[derive(Serialize)]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub outcome: ExtractionOutcome,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: Option<EngineInfo>,
    pub available_engines: Vec<&'static str>,
    pub script_hint: String,
    pub completion_configured: bool,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let extractor = Extractor::from_config(&config)?;
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState {
        extractor: Arc::new(extractor),
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/extract", post(handle_extract))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle extraction requests
async fn handle_extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, OcrError> {
    let start = Instant::now();
    let max = state.config.max_file_size;
    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    let mut file_data: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;
    let mut with_structure = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to parse multipart", declared_size, max))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    multipart_error(e, "Failed to read file data", declared_size, max)
                })?;
                file_data = Some(bytes.to_vec());
            }
            "structure" => {
                let value = field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid structure flag: {}", e))
                })?;
                with_structure = parse_flag(&value)?;
            }
            _ => {}
        }
    }

    let data = file_data.ok_or(OcrError::MissingFile)?;

    if data.len() > max {
        return Err(OcrError::FileTooLarge {
            size: data.len(),
            max,
        });
    }

    let outcome = state
        .extractor
        .extract(data, content_type.as_deref(), with_structure)
        .await;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Extraction completed in {}ms: kind={}, pages={}, text length={}",
        processing_time_ms,
        outcome.kind.as_str(),
        outcome.page_count,
        outcome.text.chars().count()
    );

    Ok(Json(ExtractResponse {
        outcome,
        processing_time_ms,
    }))
}

/// Body-limit rejections surface as multipart errors mid-stream; report them as
/// oversized uploads rather than malformed ones.
fn multipart_error(
    err: MultipartError,
    context: &str,
    declared_size: Option<usize>,
    max: usize,
) -> OcrError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return OcrError::FileTooLarge {
            size: declared_size.unwrap_or(max + MULTIPART_OVERHEAD + 1),
            max,
        };
    }
    OcrError::InvalidRequest(format!("{}: {}", context, err))
}

fn parse_flag(value: &str) -> Result<bool, OcrError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => Err(OcrError::InvalidRequest(format!(
            "Invalid structure flag: {}",
            other
        ))),
    }
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state
            .extractor
            .recognizer()
            .map(|recognizer| engines::info(recognizer.engine())),
        available_engines: engines::compiled_engines(),
        script_hint: state.config.script_hint.to_string(),
        completion_configured: state.extractor.completion_configured(),
        supported_formats: document::supported_formats(),
        max_file_size_bytes: state.config.max_file_size,
    })
}
