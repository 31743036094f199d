// epx-core/src/core/status_map/tests.rs
// ============================================================================
// Module: Status Mapper Tests
// Description: Unit tests for executor status mapping.
// Purpose: Validate totality and agreement between the two projections.
// Dependencies: none beyond the parent module
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::map_executor_status;
use super::pod_phase_to_status;
use crate::core::run::PodPhase;
use crate::core::run::RunStatus;

#[test]
fn known_statuses_map_per_the_table() {
    assert_eq!(map_executor_status("SUBMITTED"), (RunStatus::Queued, PodPhase::Pending));
    assert_eq!(map_executor_status("PENDING"), (RunStatus::Queued, PodPhase::Pending));
    assert_eq!(map_executor_status("RUNNABLE"), (RunStatus::Queued, PodPhase::Pending));
    assert_eq!(map_executor_status("STARTING"), (RunStatus::Running, PodPhase::Running));
    assert_eq!(map_executor_status("RUNNING"), (RunStatus::Running, PodPhase::Running));
    assert_eq!(map_executor_status("SUCCEEDED"), (RunStatus::Done, PodPhase::Succeeded));
    assert_eq!(map_executor_status("FAILED"), (RunStatus::Error, PodPhase::Failed));
}

#[test]
fn unknown_statuses_degrade_to_error_unknown() {
    assert_eq!(map_executor_status("EXPLODED"), (RunStatus::Error, PodPhase::Unknown));
    assert_eq!(map_executor_status(""), (RunStatus::Error, PodPhase::Unknown));
    assert_eq!(map_executor_status("running"), (RunStatus::Error, PodPhase::Unknown));
}

#[test]
fn pod_phase_projection_matches_the_boundary_table() {
    assert_eq!(pod_phase_to_status(PodPhase::Pending), RunStatus::Queued);
    assert_eq!(pod_phase_to_status(PodPhase::Running), RunStatus::Running);
    assert_eq!(pod_phase_to_status(PodPhase::Succeeded), RunStatus::Done);
    assert_eq!(pod_phase_to_status(PodPhase::Failed), RunStatus::Error);
    assert_eq!(pod_phase_to_status(PodPhase::Unknown), RunStatus::Error);
}

#[test]
fn projections_agree_for_every_known_executor_status() {
    for status in ["SUBMITTED", "PENDING", "RUNNABLE", "STARTING", "RUNNING", "SUCCEEDED", "FAILED"] {
        let (run_status, pod_phase) = map_executor_status(status);
        assert_eq!(pod_phase_to_status(pod_phase), run_status, "disagreement for {status}");
    }
}
