//! End-to-end tests against a mocked generateContent endpoint.

use agridoc::core::config::{Config, DEFAULT_MODEL};
use agridoc::core::errors::{FailureReason, TransportError};
use agridoc::core::types::{IncomingFile, PipelineOutcome};
use agridoc::orchestration::DiagnosisPipeline;
use agridoc::server::{router, AppState};
use agridoc::utils::Metrics;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIAGNOSIS: &str = r#"{"diseaseName":"Early Blight","treatmentSteps":"1. Remove lower leaves. 2. Apply chlorothalonil.","suggestedMedicines":"Chlorothalonil","futurePreventionTips":"1. Mulch the soil. 2. Water at the base."}"#;

fn endpoint() -> String {
    format!("/models/{}:generateContent", DEFAULT_MODEL)
}

fn envelope(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }],
        "usageMetadata": { "promptTokenCount": 300, "candidatesTokenCount": 40 }
    })
}

fn pipeline(mock_server: &MockServer, metrics: Metrics) -> DiagnosisPipeline {
    let config = Config::for_endpoint(mock_server.uri(), "test-key").with_retry(3, 10);
    DiagnosisPipeline::from_config(Arc::new(config), Some(metrics))
        .expect("Failed to create pipeline")
}

fn png_upload() -> IncomingFile {
    IncomingFile::new("image/png", vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4])
}

#[tokio::test]
async fn test_successful_diagnosis() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(endpoint()))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(DIAGNOSIS)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let metrics = Metrics::new();
    let pipeline = pipeline(&mock_server, metrics.clone());
    let image = pipeline.ingest(png_upload()).unwrap();

    match pipeline.run(&image, "").await {
        PipelineOutcome::Success(d) => {
            assert_eq!(d.disease_name, "Early Blight");
            assert_eq!(d.suggested_medicines, "Chlorothalonil");
        }
        other => panic!("expected Success, got {:?}", other),
    }

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
        "image/png"
    );
    assert_eq!(metrics.snapshot().api_tokens_input, 300);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "Model not found", "status": "NOT_FOUND" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline(&mock_server, Metrics::new());
    let image = pipeline.ingest(png_upload()).unwrap();

    assert_eq!(
        pipeline.run(&image, "").await,
        PipelineOutcome::Failure(FailureReason::Transport(TransportError::Rejected {
            status: 404,
            message: "Model not found".to_string(),
        }))
    );
}

#[tokio::test]
async fn test_unavailable_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(DIAGNOSIS)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let metrics = Metrics::new();
    let pipeline = pipeline(&mock_server, metrics.clone());
    let image = pipeline.ingest(png_upload()).unwrap();

    assert!(matches!(
        pipeline.run(&image, "").await,
        PipelineOutcome::Success(_)
    ));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.api_calls_total, 2);
    assert_eq!(snapshot.api_retries_total, 1);
}

#[tokio::test]
async fn test_analyze_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(DIAGNOSIS)))
        .mount(&mock_server)
        .await;

    let metrics = Metrics::new();
    let state = AppState {
        pipeline: Arc::new(pipeline(&mock_server, metrics.clone())),
        metrics,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    let client = reqwest::Client::new();
    let url = format!("http://{}/analyze", addr);

    let form = reqwest::multipart::Form::new()
        .part(
            "image",
            reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G', 1, 2, 3])
                .file_name("leaf.png")
                .mime_str("image/png")
                .unwrap(),
        )
        .text("note", "  brown rings on lower leaves ");
    let response = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["outcome_kind"], "success");
    assert_eq!(json["view"]["kind"], "diagnosis");
    assert!(json["text"].as_str().unwrap().contains("**Early Blight**"));

    // The note reaches the model untouched
    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"  brown rings on lower leaves \""));

    let form = reqwest::multipart::Form::new().part(
        "image",
        reqwest::multipart::Part::bytes(b"%PDF-1.4".to_vec())
            .file_name("report.pdf")
            .mime_str("application/pdf")
            .unwrap(),
    );
    let response = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert!(json["outcome_kind"].is_null());
    assert!(json["text"]
        .as_str()
        .unwrap()
        .contains("Please upload an image file"));

    let stats: serde_json::Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["outcomes_success"], 1);
    assert_eq!(stats["ingest_rejections"], 1);
}
