// epx-cli/src/output/tests.rs
// ============================================================================
// Module: CLI Output Tests
// Description: Unit tests for table rendering.
// Purpose: Validate renderers tolerate partial records and format stably.
// Dependencies: serde_json
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use serde_json::json;

use super::format_job_info;
use super::format_jobs_list;
use super::format_uploads;

#[test]
fn empty_job_lists_say_so() {
    assert_eq!(format_jobs_list(&[]), "No jobs found.");
}

#[test]
fn job_rows_carry_id_user_status_and_tags() {
    let jobs = vec![json!({
        "id": 12, "userId": 123, "status": "SUBMITTED",
        "createdAt": "2025-10-23T21:15:00Z", "tags": ["info_job", "weekly"],
    })];
    let rendered = format_jobs_list(&jobs);
    assert!(rendered.contains("12"));
    assert!(rendered.contains("SUBMITTED"));
    assert!(rendered.contains("info_job,weekly"));
    assert!(rendered.contains("1 job(s)"));
}

#[test]
fn job_info_lists_runs_and_locations() {
    let job = json!({
        "id": 1, "userId": 123, "status": "PROCESSING",
        "createdAt": "2025-10-23T21:15:00Z", "updatedAt": "2025-10-23T21:20:00Z",
        "inputLocation": "https://bucket.s3.amazonaws.com/jobs/1/job_input.zip",
    });
    let runs = vec![json!({
        "id": 4, "status": "DONE", "podPhase": "Succeeded",
        "results_url": "https://bucket.s3.amazonaws.com/jobs/1/run_4_results.zip",
    })];
    let rendered = format_job_info(&job, &runs);
    assert!(rendered.contains("Job 1"));
    assert!(rendered.contains("input:"));
    assert!(rendered.contains("run 4"));
    assert!(rendered.contains("run_4_results.zip"));
}

#[test]
fn job_info_handles_missing_fields() {
    let rendered = format_job_info(&json!({}), &[]);
    assert!(rendered.contains("Job -"));
    assert!(rendered.contains("runs:    none"));
}

#[test]
fn uploads_include_location_and_content_preview() {
    let uploads = vec![json!({
        "context": "run", "uploadType": "config", "jobId": 1, "runId": 4,
        "location": {"url": "https://bucket.s3.amazonaws.com/jobs/1/run_4_config.json"},
        "content": {"type": "json", "content": "{\n  \"params\": {}\n}"},
    })];
    let rendered = format_uploads(&uploads);
    assert!(rendered.contains("run/config (job 1, run 4)"));
    assert!(rendered.contains("location: https://bucket.s3.amazonaws.com/jobs/1/run_4_config.json"));
    assert!(rendered.contains("| {"));
}
