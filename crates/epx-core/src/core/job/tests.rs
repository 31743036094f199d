// epx-core/src/core/job/tests.rs
// ============================================================================
// Module: Job Entity Tests
// Description: Unit tests for the job status state machine.
// Purpose: Validate the transition table, terminal states, and serialization.
// Dependencies: serde_json
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::Job;
use super::JobStatus;

fn job() -> Job {
    Job::create_unpersisted(123, vec!["info_job".to_owned()])
}

#[test]
fn new_job_starts_created_and_unpersisted() {
    let job = job();
    assert_eq!(job.status, JobStatus::Created);
    assert!(!job.is_persisted());
    assert!(job.is_active());
}

#[test]
fn happy_path_transitions_are_allowed() {
    let mut job = job();
    job.update_status(JobStatus::Submitted).expect("created -> submitted");
    job.update_status(JobStatus::Processing).expect("submitted -> processing");
    job.update_status(JobStatus::Completed).expect("processing -> completed");
    assert!(!job.is_active());
}

#[test]
fn processing_may_fail() {
    let mut job = job();
    job.update_status(JobStatus::Submitted).expect("submit");
    job.update_status(JobStatus::Processing).expect("process");
    job.update_status(JobStatus::Failed).expect("processing -> failed");
}

#[test]
fn every_non_terminal_status_may_cancel() {
    for path in [0_usize, 1, 2] {
        let mut job = job();
        if path >= 1 {
            job.update_status(JobStatus::Submitted).expect("submit");
        }
        if path >= 2 {
            job.update_status(JobStatus::Processing).expect("process");
        }
        job.update_status(JobStatus::Cancelled).expect("cancel");
        assert_eq!(job.status, JobStatus::Cancelled);
    }
}

#[test]
fn skipping_a_stage_is_rejected() {
    let mut job = job();
    let err = job.update_status(JobStatus::Processing).expect_err("created -> processing");
    assert_eq!(err.from, JobStatus::Created);
    assert_eq!(err.to, JobStatus::Processing);
    assert_eq!(job.status, JobStatus::Created);
}

#[test]
fn terminal_statuses_reject_everything() {
    for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
        for target in [
            JobStatus::Created,
            JobStatus::Submitted,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(!terminal.can_transition_to(target), "{terminal} -> {target}");
        }
    }
}

#[test]
fn status_round_trips_through_strings() {
    for status in [
        JobStatus::Created,
        JobStatus::Submitted,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        assert_eq!(JobStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(JobStatus::parse("created"), None);
}

#[test]
fn to_dict_uses_camel_case_keys() {
    let mut job = job();
    job.id = Some(7);
    let dict = job.to_dict();
    assert_eq!(dict["id"], 7);
    assert_eq!(dict["userId"], 123);
    assert_eq!(dict["status"], "CREATED");
    assert_eq!(dict["tags"][0], "info_job");
}
