// epx-server/tests/http_surface.rs
// ============================================================================
// Module: HTTP Surface Tests
// Description: End-to-end tests against a bound listener.
// Purpose: Validate routes, header rules, and lifecycle scenarios over HTTP.
// ============================================================================

//! ## Overview
//! Spins the real router over in-memory repositories and dummy gateways on
//! an ephemeral port, then exercises the documented surface with a plain
//! HTTP client: registration, submission routing, run submission with
//! dispatch, reconciliation fallback, and the error contract for missing
//! headers and malformed parameters.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::net::SocketAddr;
use std::sync::Arc;

use epx_core::InMemoryJobRepository;
use epx_core::InMemoryRunRepository;
use epx_core::JobController;
use epx_core::core::identity::IdentityToken;
use epx_gateways::DummyBatchGateway;
use epx_gateways::DummyResultsGateway;
use epx_gateways::DummyUploadGateway;
use epx_server::AppState;
use epx_server::build_router;
use serde_json::Value;
use serde_json::json;

/// Token fixture: user 123, scopes hash abc123.
const TOKEN: &str = "Bearer eyJ1c2VyX2lkIjogMTIzLCAic2NvcGVzX2hhc2giOiAiYWJjMTIzIn0=";

/// Binds the API on an ephemeral port and returns its base URL.
async fn serve() -> String {
    let controller = Arc::new(JobController::new(
        Arc::new(InMemoryJobRepository::new()),
        Arc::new(InMemoryRunRepository::new()),
        Arc::new(DummyUploadGateway::default()),
        Arc::new(DummyResultsGateway),
        Arc::new(DummyBatchGateway),
        "test-bucket".to_owned(),
    ));
    let router = build_router(AppState::new(controller));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address: SocketAddr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{address}")
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// POST helper carrying the full write-header set.
async fn post_json(base: &str, path: &str, body: &Value) -> (u16, Value) {
    let response = client()
        .post(format!("{base}{path}"))
        .header("Offline-Token", TOKEN)
        .header("content-type", "application/json")
        .header("Fredcli-Version", "0.4.0")
        .header("user-agent", "epx_client_1.2.2")
        .body(body.to_string())
        .send()
        .await
        .expect("send");
    let status = response.status().as_u16();
    let body: Value = response.json().await.expect("json body");
    (status, body)
}

/// GET helper carrying the read-header set.
async fn get_json(base: &str, path: &str) -> (u16, Value) {
    let response = client()
        .get(format!("{base}{path}"))
        .header("Offline-Token", TOKEN)
        .header("Fredcli-Version", "0.4.0")
        .send()
        .await
        .expect("send");
    let status = response.status().as_u16();
    let body: Value = response.json().await.expect("json body");
    (status, body)
}

#[tokio::test(flavor = "multi_thread")]
async fn register_job_happy_path() {
    let base = serve().await;
    let (status, body) = post_json(&base, "/jobs/register", &json!({"tags": ["info_job"]})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"id": 1, "userId": 123, "tags": ["info_job"]}));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_job_requires_all_headers() {
    let base = serve().await;
    let response = client()
        .post(format!("{base}/jobs/register"))
        .header("content-type", "application/json")
        .body(json!({"tags": []}).to_string())
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Missing required headers");
}

#[tokio::test(flavor = "multi_thread")]
async fn register_job_rejects_invalid_tokens() {
    let base = serve().await;
    let response = client()
        .post(format!("{base}/jobs/register"))
        .header("Offline-Token", "Bearer not-base64!!!")
        .header("content-type", "application/json")
        .header("Fredcli-Version", "0.4.0")
        .header("user-agent", "epx_client_1.2.2")
        .body(json!({"tags": []}).to_string())
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn register_job_rejects_non_json_bodies() {
    let base = serve().await;
    let response = client()
        .post(format!("{base}/jobs/register"))
        .header("Offline-Token", TOKEN)
        .header("content-type", "application/json")
        .header("Fredcli-Version", "0.4.0")
        .header("user-agent", "epx_client_1.2.2")
        .body("not json")
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Invalid JSON");
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_job_returns_the_brokered_url_and_transitions_state() {
    let base = serve().await;
    post_json(&base, "/jobs/register", &json!({"tags": []})).await;
    let (status, body) = post_json(
        &base,
        "/jobs",
        &json!({"jobId": 1, "context": "job", "type": "input"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["url"], "http://localhost:5001/pre-signed-url");

    // A second submission finds the job no longer in CREATED.
    let (status, body) = post_json(
        &base,
        "/jobs",
        &json!({"jobId": 1, "context": "job", "type": "input"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().expect("error").contains("CREATED"));
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_job_rejects_unsupported_pairs() {
    let base = serve().await;
    post_json(&base, "/jobs/register", &json!({"tags": []})).await;
    let (status, _) = post_json(
        &base,
        "/jobs",
        &json!({"jobId": 1, "context": "run", "type": "results", "runId": 1}),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_runs_then_get_runs_round_trips() {
    let base = serve().await;
    post_json(&base, "/jobs/register", &json!({"tags": []})).await;

    let (status, body) = post_json(
        &base,
        "/runs",
        &json!({"runRequests": [{"jobId": 1, "size": "hot"}]}),
    )
    .await;
    assert_eq!(status, 200);
    let responses = body["runResponses"].as_array().expect("responses");
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["runId"], 1);
    assert_eq!(responses[0]["jobId"], 1);
    assert_eq!(responses[0]["status"], "Submitted");
    assert_eq!(responses[0]["runRequest"]["size"], "hot");

    // The dummy executor reports the unavailability sentinel, so stored
    // status survives reconciliation and serializes canonically.
    let (status, body) = get_json(&base, "/runs?job_id=1").await;
    assert_eq!(status, 200);
    let runs = body["runs"].as_array().expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["status"], "QUEUED");
    assert_eq!(runs[0]["podPhase"], "Pending");
    assert_eq!(runs[0]["epxClientVersion"], "1.2.2");
    assert!(runs[0]["config_url"].as_str().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn get_runs_validates_the_job_id_parameter() {
    let base = serve().await;
    let (status, body) = get_json(&base, "/runs").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Missing job_id parameter");

    let (status, body) = get_json(&base, "/runs?job_id=abc").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid job_id parameter");
}

#[tokio::test(flavor = "multi_thread")]
async fn job_results_reports_presigned_urls_per_run() {
    let base = serve().await;
    post_json(&base, "/jobs/register", &json!({"tags": []})).await;
    post_json(&base, "/runs", &json!({"runRequests": [{"jobId": 1}]})).await;

    let (status, body) = get_json(&base, "/jobs/results?job_id=1").await;
    assert_eq!(status, 200);
    let urls = body["urls"].as_array().expect("urls");
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["run_id"], 1);
    let url = urls[0]["url"].as_str().expect("url");
    assert!(url.contains("run_1_results.zip"));
    assert!(url.contains("X-Amz-Expires=86400"));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_needs_no_headers() {
    let base = serve().await;
    let response = client().get(format!("{base}/health")).send().await.expect("send");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn tokens_generated_by_the_cli_helper_are_accepted() {
    let base = serve().await;
    let bearer = IdentityToken::generate_bearer(77, None);
    let response = client()
        .post(format!("{base}/jobs/register"))
        .header("Offline-Token", bearer)
        .header("content-type", "application/json; charset=utf-8")
        .header("Fredcli-Version", "0.4.0")
        .header("user-agent", "epx_client_2.0.1")
        .body(json!({"tags": ["t"]}).to_string())
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["userId"], 77);
}
