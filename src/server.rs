// HTTP surface: upload form target plus monitoring endpoints

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::core::errors::SessionError;
use crate::core::types::{IncomingFile, OutcomeKind, MAX_IMAGE_BYTES};
use crate::orchestration::DiagnosisPipeline;
use crate::services::presenter::{RenderedView, ResultPresenter};
use crate::utils::{sniff_mime_type, Metrics};

/// Headroom over the image limit so oversize files reach the ingestor
const BODY_LIMIT: usize = MAX_IMAGE_BYTES + 6 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DiagnosisPipeline>,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// None when the request never reached the pipeline
    pub outcome_kind: Option<OutcomeKind>,
    pub view: RenderedView,
    pub text: String,
}

impl AnalyzeResponse {
    fn new(outcome_kind: Option<OutcomeKind>, view: RenderedView) -> Self {
        let text = view.to_text();
        Self {
            outcome_kind,
            view,
            text,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/analyze", post(analyze))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
}

async fn root() -> &'static str {
    "AgriDoc - crop disease diagnosis"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    serde_json::to_value(state.metrics.snapshot())
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize metrics: {}", e),
            )
        })
}

/// Analyze one uploaded image
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": the crop photo
/// - Field "note" (optional): free-text context
///
/// # Response:
/// - 200 with the rendered view for every pipeline outcome
/// - 400 with an error view when the upload is missing or rejected
async fn analyze(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let start_time = std::time::Instant::now();
    info!("Received analyze request");

    let mut upload: Option<IncomingFile> = None;
    let mut note = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)).into_response()
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let declared_type = field.content_type().map(str::to_string);
                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(e) => {
                        return (StatusCode::BAD_REQUEST, format!("Read error: {}", e))
                            .into_response()
                    }
                };

                let mime_type = declared_type
                    .filter(|t| !t.is_empty() && t != "application/octet-stream")
                    .or_else(|| {
                        sniff_mime_type(&data, file_name.as_deref().map(std::path::Path::new))
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let mut file = IncomingFile::new(mime_type, data.to_vec());
                if let Some(file_name) = file_name {
                    file = file.with_file_name(file_name);
                }
                upload = Some(file);
            }
            "note" => match field.text().await {
                Ok(text) => note = text,
                Err(e) => {
                    return (StatusCode::BAD_REQUEST, format!("Note read error: {}", e))
                        .into_response()
                }
            },
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let image = match upload.ok_or(SessionError::NoImage).and_then(|file| {
        state.pipeline.ingest(file).map_err(SessionError::from)
    }) {
        Ok(image) => image,
        Err(e) => {
            let view = ResultPresenter::present_session_error(&e);
            return (StatusCode::BAD_REQUEST, Json(AnalyzeResponse::new(None, view)))
                .into_response();
        }
    };

    let outcome = state.pipeline.run(&image, &note).await;
    let kind = outcome.kind();
    let view = ResultPresenter::present(&outcome);

    info!(
        "Request completed in {:.2}s: {}",
        start_time.elapsed().as_secs_f64(),
        kind.as_str()
    );

    Json(AnalyzeResponse::new(Some(kind), view)).into_response()
}
