// epx-server/src/routes.rs
// ============================================================================
// Module: EPX HTTP Routes
// Description: Route handlers for the control-plane API.
// Purpose: Validate headers and bodies, dispatch to the controller, and map
//          outcomes to status codes.
// Dependencies: axum, epx-core, serde_json
// ============================================================================

//! ## Overview
//! Every handler follows the same shape: validate required headers
//! (case-insensitively, content-type parameters ignored), decode the body,
//! call one controller operation, and serialize the result. Controller
//! rejections become 400 with the message verbatim; internal failures become
//! 500 with a generic message. No exception-like state crosses this
//! boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use axum::Router;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use epx_core::ControllerError;
use epx_core::core::timefmt;
use serde_json::Value;
use serde_json::json;

use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Headers required by the write endpoints.
const WRITE_HEADERS: [&str; 4] = ["Offline-Token", "content-type", "Fredcli-Version", "user-agent"];
/// Headers required by the read endpoints.
const READ_HEADERS: [&str; 2] = ["Offline-Token", "Fredcli-Version"];

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the API router over shared state.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/jobs/register", post(register_job))
        .route("/jobs", post(submit_job))
        .route("/jobs/results", get(get_job_results))
        .route("/runs", post(submit_runs).get(get_runs))
        .with_state(state)
}

// ============================================================================
// SECTION: Response Helpers
// ============================================================================

/// Serializes an error body.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

/// Maps a controller failure onto the HTTP surface.
fn failure_response(err: &ControllerError) -> Response {
    match err {
        ControllerError::Rejected(message) => {
            tracing::warn!(error = %message, "request rejected");
            error_response(StatusCode::BAD_REQUEST, message.clone())
        }
        ControllerError::Internal(message) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message.clone())
        }
    }
}

/// Checks required headers are present, case-insensitively.
fn require_headers(headers: &HeaderMap, required: &[&str]) -> Result<(), Response> {
    for name in required {
        if !headers.contains_key(name.to_lowercase().as_str()) {
            return Err(error_response(StatusCode::BAD_REQUEST, "Missing required headers"));
        }
    }
    Ok(())
}

/// Checks the content type is JSON, ignoring parameters such as charset.
fn require_json_content(headers: &HeaderMap) -> Result<(), Response> {
    let value = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let main_type = value.split(';').next().unwrap_or_default().trim().to_lowercase();
    if main_type == "application/json" {
        Ok(())
    } else {
        Err(error_response(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/json",
        ))
    }
}

/// Decodes a JSON object body.
fn parse_body(body: &str) -> Result<Value, Response> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => Ok(value),
        _ => Err(error_response(StatusCode::BAD_REQUEST, "Invalid JSON")),
    }
}

/// Extracts the offline token header value.
fn offline_token(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("offline-token")
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing Offline-Token header"))
}

/// Parses the `job_id` query parameter.
fn job_id_param(params: &HashMap<String, String>) -> Result<i64, Response> {
    let raw = params
        .get("job_id")
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing job_id parameter"))?;
    raw.parse::<i64>()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid job_id parameter"))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /` - API metadata.
async fn root() -> Response {
    axum::Json(json!({
        "name": "EPX API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Interface for creating and running simulation jobs",
        "endpoints": {
            "POST /jobs/register": "Register a new job",
            "POST /jobs": "Submit a job for processing",
            "POST /runs": "Submit run requests",
            "GET /runs": "Get runs by job_id",
            "GET /jobs/results": "Get result URLs for runs by job_id",
            "GET /health": "Health check",
        },
    }))
    .into_response()
}

/// `GET /health` - liveness probe.
async fn health() -> Response {
    axum::Json(json!({
        "status": "healthy",
        "timestamp": timefmt::format_utc(timefmt::now_utc()),
    }))
    .into_response()
}

/// `POST /jobs/register` - persist a new job.
async fn register_job(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Err(response) = require_headers(&headers, &WRITE_HEADERS) {
        return response;
    }
    if let Err(response) = require_json_content(&headers) {
        return response;
    }
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let token = match offline_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let tags: Vec<String> = payload
        .get("tags")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    match state.controller.register_job(&token, tags) {
        Ok(job) => axum::Json(json!({
            "id": job["id"],
            "userId": job["userId"],
            "tags": job["tags"],
        }))
        .into_response(),
        Err(err) => failure_response(&err),
    }
}

/// `POST /jobs` - broker an upload for a job or run.
async fn submit_job(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Err(response) = require_headers(&headers, &WRITE_HEADERS) {
        return response;
    }
    if let Err(response) = require_json_content(&headers) {
        return response;
    }
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let Some(job_id) = payload.get("jobId").and_then(Value::as_i64) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid jobId");
    };
    let context = payload
        .get("context")
        .and_then(Value::as_str)
        .unwrap_or("job")
        .to_owned();
    let upload_type = payload
        .get("type")
        .or_else(|| payload.get("uploadType"))
        .and_then(Value::as_str)
        .unwrap_or("input")
        .to_owned();
    let run_id = payload.get("runId").and_then(Value::as_i64);

    match state
        .controller
        .submit_job(job_id, &context, &upload_type, run_id)
        .await
    {
        Ok(location) => axum::Json(location).into_response(),
        Err(err) => failure_response(&err),
    }
}

/// `POST /runs` - persist and dispatch run requests.
async fn submit_runs(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Err(response) = require_headers(&headers, &WRITE_HEADERS) {
        return response;
    }
    if let Err(response) = require_json_content(&headers) {
        return response;
    }
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let token = match offline_token(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let Some(run_requests) = payload.get("runRequests").and_then(Value::as_array) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing runRequests");
    };
    let epx_version = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("epx_client_1.2.2")
        .to_owned();

    match state
        .controller
        .submit_runs(&token, run_requests.clone(), &epx_version)
        .await
    {
        Ok(responses) => axum::Json(json!({ "runResponses": responses })).into_response(),
        Err(err) => failure_response(&err),
    }
}

/// `GET /runs?job_id=N` - list runs with status reconciliation.
async fn get_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = require_headers(&headers, &READ_HEADERS) {
        return response;
    }
    let job_id = match job_id_param(&params) {
        Ok(job_id) => job_id,
        Err(response) => return response,
    };
    match state.controller.get_runs(job_id).await {
        Ok(runs) => axum::Json(json!({ "runs": runs })).into_response(),
        Err(err) => failure_response(&err),
    }
}

/// `GET /jobs/results?job_id=N` - presigned result URLs per run.
async fn get_job_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = require_headers(&headers, &READ_HEADERS) {
        return response;
    }
    let job_id = match job_id_param(&params) {
        Ok(job_id) => job_id,
        Err(response) => return response,
    };
    match state.controller.get_run_results(job_id).await {
        Ok(urls) => axum::Json(json!({ "urls": urls })).into_response(),
        Err(err) => failure_response(&err),
    }
}
