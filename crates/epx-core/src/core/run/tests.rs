// epx-core/src/core/run/tests.rs
// ============================================================================
// Module: Run Entity Tests
// Description: Unit tests for run status aliases and serialization.
// Purpose: Validate alias projection, atomic status updates, and wire shapes.
// Dependencies: serde_json
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use serde_json::json;

use super::PodPhase;
use super::Run;
use super::RunStatus;

fn run() -> Run {
    Run::create_unpersisted(1, 123, json!({"jobId": 1}), "1.2.2".to_owned())
}

#[test]
fn fresh_runs_hold_the_legacy_submitted_alias() {
    let run = run();
    assert_eq!(run.status, RunStatus::Submitted);
    assert_eq!(run.pod_phase, PodPhase::Pending);
    assert_eq!(run.status.canonical(), RunStatus::Queued);
}

#[test]
fn legacy_aliases_project_onto_canonical_values() {
    assert_eq!(RunStatus::Submitted.canonical(), RunStatus::Queued);
    assert_eq!(RunStatus::Failed.canonical(), RunStatus::Error);
    assert_eq!(RunStatus::Cancelled.canonical(), RunStatus::Error);
    for canonical in [
        RunStatus::Queued,
        RunStatus::NotStarted,
        RunStatus::Running,
        RunStatus::Done,
        RunStatus::Error,
    ] {
        assert_eq!(canonical.canonical(), canonical);
    }
}

#[test]
fn canonical_equality_treats_submitted_as_queued() {
    assert!(RunStatus::Submitted.canonically_eq(RunStatus::Queued));
    assert!(RunStatus::Cancelled.canonically_eq(RunStatus::Failed));
    assert!(!RunStatus::Queued.canonically_eq(RunStatus::Done));
}

#[test]
fn statuses_round_trip_through_strings() {
    for status in [
        RunStatus::Queued,
        RunStatus::NotStarted,
        RunStatus::Running,
        RunStatus::Done,
        RunStatus::Error,
        RunStatus::Submitted,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ] {
        assert_eq!(RunStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(RunStatus::parse("SUBMITTED"), None);
}

#[test]
fn update_status_replaces_both_fields() {
    let mut run = run();
    run.update_status(RunStatus::Running, PodPhase::Running);
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.pod_phase, PodPhase::Running);
}

#[test]
fn to_dict_projects_legacy_status_for_clients() {
    let mut run = run();
    run.id = Some(4);
    let dict = run.to_dict();
    assert_eq!(dict["status"], "QUEUED");
    assert_eq!(dict["podPhase"], "Pending");
    assert_eq!(dict["jobId"], 1);
    assert_eq!(dict["userDeleted"], false);
    assert_eq!(dict["epxClientVersion"], "1.2.2");
    assert!(dict["results_url"].is_null());
    assert!(dict["results_uploaded_at"].is_null());
}

#[test]
fn run_response_reports_the_raw_stored_status() {
    let mut run = run();
    run.id = Some(4);
    let dict = run.to_run_response_dict();
    assert_eq!(dict["runId"], 4);
    assert_eq!(dict["status"], "Submitted");
    assert!(dict["errors"].is_null());
    assert_eq!(dict["runRequest"]["jobId"], 1);
}
