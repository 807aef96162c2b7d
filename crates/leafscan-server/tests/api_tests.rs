//! End-to-end tests for the HTTP API
//!
//! Requests go through the full router (extractors, body limit, handlers)
//! with `oneshot`, backed by a seeded mock pipeline and an in-memory store.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use leafscan_core::{Error as CoreError, Result as CoreResult};
use leafscan_inference::{
    BackendInput, BackendKind, DiseaseCatalog, InferenceBackend, InferenceConfig,
    InferencePipeline, Preprocessor, RawPrediction,
};
use leafscan_server::{create_router, AppState, ServerConfig};
use leafscan_telemetry::{DetectionStore, MemoryStore};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "leafscan-test-boundary";

fn mock_pipeline() -> InferencePipeline {
    let mut config = InferenceConfig::default();
    config.model.path = "/nonexistent/leafscan/model.safetensors".into();
    config.mock.seed = Some(42);
    InferencePipeline::from_config(&config).unwrap()
}

fn test_app_with(
    pipeline: InferencePipeline,
    config: &ServerConfig,
) -> (Router, Arc<dyn DetectionStore>) {
    let store: Arc<dyn DetectionStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(pipeline, store.clone());
    (create_router(state, config), store)
}

fn test_app() -> (Router, Arc<dyn DetectionStore>) {
    test_app_with(mock_pipeline(), &ServerConfig::default())
}

fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(48, 32, image::Rgb([40, 140, 60]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

enum Part<'a> {
    File(&'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(bytes) => {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"file\"; filename=\"leaf.jpg\"\r\n",
                );
                body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn predict_request(user: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/detection/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len());
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body)).unwrap()
}

fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A model-kind backend; it never sees undecodable uploads
struct ModelStub;

impl InferenceBackend for ModelStub {
    fn name(&self) -> &str {
        "stub"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Model
    }

    fn infer(&self, _input: BackendInput<'_>) -> CoreResult<RawPrediction> {
        Ok(RawPrediction::new("Healthy Leaf", 0.97))
    }
}

fn model_stub_pipeline() -> InferencePipeline {
    InferencePipeline::new(
        Arc::new(ModelStub),
        Arc::new(DiseaseCatalog::builtin()),
        Preprocessor::default(),
    )
}

/// A backend whose forward pass always fails with an internal message
struct BrokenBackend;

impl InferenceBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn infer(&self, _input: BackendInput<'_>) -> CoreResult<RawPrediction> {
        Err(CoreError::inference(
            "cuda kernel crashed reading /secret/weights.safetensors",
        ))
    }
}

#[tokio::test]
async fn test_health_and_root() {
    let (app, _) = test_app();

    let response = app.clone().oneshot(get_request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "LeafScan API is operational");
}

#[tokio::test]
async fn test_ready_reports_mock_mode() {
    let (app, _) = test_app();

    let response = app.oneshot(get_request("/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["mode"], "mock");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["detections"], 0);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let (app, _) = test_app();

    let response = app.oneshot(get_request("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_predict_requires_identity() {
    let (app, store) = test_app();
    let image = jpeg_bytes();

    let response = app
        .oneshot(predict_request(None, &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_predict_stores_detection() {
    let (app, store) = test_app();
    let image = jpeg_bytes();

    let response = app
        .oneshot(predict_request(
            Some("farmer-1"),
            &[
                Part::File(&image),
                Part::Text("latitude", "-1.2921"),
                Part::Text("longitude", "36.8219"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["id"].as_str().unwrap().starts_with("det_"));
    assert_eq!(body["user_id"], "farmer-1");
    assert_eq!(body["latitude"], -1.2921);
    assert_eq!(body["longitude"], 36.8219);

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.75..=0.99).contains(&confidence));
    assert!(["low", "medium", "high"].contains(&body["severity"].as_str().unwrap()));
    assert!(!body["treatment"].as_array().unwrap().is_empty());

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_predict_validation_errors() {
    let (app, store) = test_app();
    let image = jpeg_bytes();

    let missing_file = app
        .clone()
        .oneshot(predict_request(
            Some("farmer-1"),
            &[Part::Text("latitude", "10.0")],
        ))
        .await
        .unwrap();
    assert_eq!(missing_file.status(), StatusCode::BAD_REQUEST);

    let bad_latitude = app
        .clone()
        .oneshot(predict_request(
            Some("farmer-1"),
            &[Part::File(&image), Part::Text("latitude", "95.0")],
        ))
        .await
        .unwrap();
    assert_eq!(bad_latitude.status(), StatusCode::BAD_REQUEST);

    let not_a_number = app
        .oneshot(predict_request(
            Some("farmer-1"),
            &[Part::File(&image), Part::Text("longitude", "east")],
        ))
        .await
        .unwrap();
    assert_eq!(not_a_number.status(), StatusCode::BAD_REQUEST);
    let body = json_body(not_a_number).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_model_mode_rejects_undecodable_upload() {
    let (app, store) = test_app_with(model_stub_pipeline(), &ServerConfig::default());

    let response = app
        .clone()
        .oneshot(predict_request(
            Some("farmer-1"),
            &[Part::File(b"definitely not a jpeg")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.count().await.unwrap(), 0);

    let image = jpeg_bytes();
    let response = app
        .oneshot(predict_request(Some("farmer-1"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["disease_name"], "Healthy Leaf");
    assert_eq!(body["severity"], "low");
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let config = ServerConfig {
        max_upload_bytes: 1024,
        ..Default::default()
    };
    let (app, store) = test_app_with(mock_pipeline(), &config);
    let image = vec![0u8; 4096];

    let response = app
        .oneshot(predict_request(Some("farmer-1"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_is_scoped_and_newest_first() {
    let (app, _) = test_app();
    let image = jpeg_bytes();

    let mut alice_ids = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(predict_request(Some("alice"), &[Part::File(&image)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        alice_ids.push(body["id"].as_str().unwrap().to_string());
    }
    let response = app
        .clone()
        .oneshot(predict_request(Some("bob"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request("/api/v1/detection/history", Some("alice")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    let expected: Vec<&str> = alice_ids.iter().rev().map(String::as_str).collect();
    assert_eq!(ids, expected);

    let response = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?limit=1&offset=1",
            Some("alice"),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], alice_ids[1].as_str());

    let response = app
        .oneshot(get_request("/api/v1/detection/history", Some("carol")))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_filters() {
    let (app, _) = test_app_with(model_stub_pipeline(), &ServerConfig::default());
    let image = jpeg_bytes();

    let response = app
        .clone()
        .oneshot(predict_request(Some("alice"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let low = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?severity=low",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(low).await.as_array().unwrap().len(), 1);

    let high = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?severity=high",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert!(json_body(high).await.as_array().unwrap().is_empty());

    let unknown = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?severity=critical",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let anonymous = app
        .oneshot(get_request("/api/v1/detection/history", None))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_scopes_history() {
    let (app, _) = test_app();
    let image = jpeg_bytes();

    let body = multipart_body(&[Part::File(&image)]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/detection/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::AUTHORIZATION, "Bearer field-tablet-7")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = json_body(response).await;
    assert!(record["user_id"].as_str().unwrap().starts_with("usr_"));

    let request = Request::builder()
        .uri("/api/v1/detection/history")
        .header(header::AUTHORIZATION, "Bearer field-tablet-7")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let history = json_body(response).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], record["id"]);
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = test_app();

    let response = app
        .oneshot(get_request("/api/v2/detection/history", Some("alice")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inference_failure_is_opaque_server_error() {
    let pipeline = InferencePipeline::new(
        Arc::new(BrokenBackend),
        Arc::new(DiseaseCatalog::builtin()),
        Preprocessor::default(),
    );
    let store: Arc<dyn DetectionStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(pipeline, store.clone());
    let metrics = state.metrics.clone();
    let app = create_router(state, &ServerConfig::default());
    let image = jpeg_bytes();

    let response = app
        .oneshot(predict_request(Some("farmer-1"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Inference failed");
    assert_eq!(body["error"]["type"], "server_error");
    assert!(!body.to_string().contains("/secret"));
    assert!(!body.to_string().contains("cuda"));

    assert_eq!(store.count().await.unwrap(), 0);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.predictions, 0);
    assert_eq!(snapshot.stored, 0);
}

#[tokio::test]
async fn test_history_since_filter() {
    let (app, _) = test_app();
    let image = jpeg_bytes();

    let response = app
        .clone()
        .oneshot(predict_request(Some("alice"), &[Part::File(&image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let past = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?since=2000-01-01T00:00:00Z",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(past).await.as_array().unwrap().len(), 1);

    let future = app
        .clone()
        .oneshot(get_request(
            "/api/v1/detection/history?since=2999-01-01T00:00:00Z",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert!(json_body(future).await.as_array().unwrap().is_empty());

    let invalid = app
        .oneshot(get_request(
            "/api/v1/detection/history?since=last-week",
            Some("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}
