//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use leafscan_core::Severity;
use leafscan_telemetry::{check_coordinates, DetectionRecord, HistoryQuery};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::identity::CallerIdentity;
use crate::state::AppState;

/// Largest page the history endpoint returns
pub const MAX_HISTORY_LIMIT: usize = 500;

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/detection/predict", post(predict))
        .route("/detection/history", get(history));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .nest(&config.api_prefix, api)
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "LeafScan API is operational",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let detections = state.store.count().await?;
    Ok(Json(json!({
        "status": "ready",
        "mode": state.pipeline.mode().as_str(),
        "backend": state.pipeline.backend_name(),
        "storage": state.store.name(),
        "detections": detections,
    })))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics recorder not installed").into_response(),
    }
}

/// Fields of the predict form
#[derive(Debug, Default)]
struct PredictForm {
    file: Option<Bytes>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl PredictForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => form.file = Some(field.bytes().await?),
                Some("latitude") => form.latitude = parse_coordinate("latitude", &field.text().await?)?,
                Some("longitude") => form.longitude = parse_coordinate("longitude", &field.text().await?)?,
                other => debug!(field = ?other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }
}

/// Blank form values count as absent
fn parse_coordinate(name: &str, value: &str) -> Result<Option<f64>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| {
            AppError::invalid(
                "invalid_coordinates",
                format!("{} must be a number, got '{}'", name, value),
            )
        })
}

/// Diagnose an uploaded leaf image and store the detection
async fn predict(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<DetectionRecord>, AppError> {
    let result = run_predict(&state, &caller, multipart).await;
    if let Err(ref err) = result {
        state.metrics.record_error(err.kind());
    }
    result.map(Json)
}

async fn run_predict(
    state: &AppState,
    caller: &CallerIdentity,
    multipart: Multipart,
) -> Result<DetectionRecord, AppError> {
    let form = PredictForm::read(multipart).await?;
    let image = form
        .file
        .ok_or_else(|| AppError::invalid("missing_file", "missing 'file' field"))?;
    check_coordinates(form.latitude, form.longitude)
        .map_err(|e| AppError::invalid("invalid_coordinates", e.to_string()))?;

    let start = Instant::now();
    let pipeline = state.pipeline.clone();
    let upload = image.clone();
    let prediction = tokio::task::spawn_blocking(move || pipeline.predict(&upload))
        .await
        .map_err(|e| AppError::internal("task_failed", format!("prediction task failed: {}", e)))??;
    let latency_us = start.elapsed().as_micros() as u64;

    let record = DetectionRecord::new(caller.as_str(), &prediction, &image)
        .with_location(form.latitude, form.longitude)
        .map_err(|e| AppError::invalid("invalid_coordinates", e.to_string()))?;

    state.store.insert(record.clone()).await?;
    state.metrics.record_stored();
    state
        .metrics
        .record_prediction(prediction.severity, state.pipeline.mode().as_str(), latency_us);

    info!(
        id = %record.id,
        disease = %record.disease_name,
        severity = %record.severity,
        latency_us,
        "Detection stored"
    );

    Ok(record)
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
    offset: Option<usize>,
    severity: Option<String>,
    /// RFC 3339 timestamp; only records created at or after it
    since: Option<String>,
}

impl HistoryParams {
    fn into_query(self, caller: &CallerIdentity) -> Result<HistoryQuery, AppError> {
        let mut query = HistoryQuery::for_user(caller.as_str());

        if let Some(severity) = self.severity.as_deref() {
            let severity: Severity = severity.parse().map_err(|_| {
                AppError::invalid("invalid_query", format!("unknown severity '{}'", severity))
            })?;
            query = query.severity(severity);
        }

        if let Some(since) = self.since.as_deref() {
            let since = DateTime::parse_from_rfc3339(since.trim()).map_err(|e| {
                AppError::invalid("invalid_query", format!("invalid 'since' '{}': {}", since, e))
            })?;
            query = query.since(since.with_timezone(&Utc));
        }

        if let Some(limit) = self.limit {
            query = query.limit(limit.min(MAX_HISTORY_LIMIT));
        }
        query.offset = self.offset;

        Ok(query)
    }
}

/// The caller's detections, newest first
async fn history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<DetectionRecord>>, AppError> {
    let result = match params.into_query(&caller) {
        Ok(query) => state.store.history(&query).await.map_err(AppError::from),
        Err(err) => Err(err),
    };
    if let Err(ref err) = result {
        state.metrics.record_error(err.kind());
    }
    result.map(Json)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    /// Rejected caller input; the message is returned to the client
    InvalidRequest { kind: &'static str, message: String },
    Unauthorized,
    PayloadTooLarge,
    /// Service-side failure; the message is logged, never returned
    Internal { kind: &'static str, message: String },
}

impl AppError {
    pub fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidRequest {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(kind: &'static str, message: impl Into<String>) -> Self {
        AppError::Internal {
            kind,
            message: message.into(),
        }
    }

    /// Label used in error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest { kind, .. } | AppError::Internal { kind, .. } => *kind,
            AppError::Unauthorized => "unauthorized",
            AppError::PayloadTooLarge => "payload_too_large",
        }
    }
}

impl From<leafscan_core::Error> for AppError {
    fn from(err: leafscan_core::Error) -> Self {
        if err.is_client_error() {
            AppError::invalid(err.kind(), err.to_string())
        } else {
            AppError::internal(err.kind(), err.to_string())
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::invalid("invalid_form", err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error_type) = match self {
            AppError::InvalidRequest { message, .. } => {
                (StatusCode::BAD_REQUEST, message, "invalid_request_error")
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing caller identity".to_string(),
                "authentication_error",
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Upload exceeds the size limit".to_string(),
                "invalid_request_error",
            ),
            AppError::Internal { kind, message } => {
                error!(kind, "Request failed: {}", message);
                let public = if kind == "inference" {
                    "Inference failed"
                } else {
                    "Internal server error"
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    public.to_string(),
                    "server_error",
                )
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });

        (status, Json(body)).into_response()
    }
}
