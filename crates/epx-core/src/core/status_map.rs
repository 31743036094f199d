// epx-core/src/core/status_map.rs
// ============================================================================
// Module: EPX Executor Status Mapper
// Description: Pure mapping from batch-executor statuses to domain enums.
// Purpose: Keep run status and pod phase derivations in one total function.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The batch executor reports coarse job states; this module maps them to the
//! internal `(RunStatus, PodPhase)` pair. The mapping is total: unknown
//! executor values degrade to `(ERROR, Unknown)` with a warning rather than
//! failing the caller. A second projection maps pod phases back to the
//! statuses exposed at the client boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::run::PodPhase;
use crate::core::run::RunStatus;

// ============================================================================
// SECTION: Executor Mapping
// ============================================================================

/// Maps an executor status string to the internal status pair.
///
/// Known values follow the executor's job lifecycle; anything else maps to
/// `(ERROR, Unknown)` and emits a warning.
#[must_use]
pub fn map_executor_status(executor_status: &str) -> (RunStatus, PodPhase) {
    match executor_status {
        "SUBMITTED" | "PENDING" | "RUNNABLE" => (RunStatus::Queued, PodPhase::Pending),
        "STARTING" | "RUNNING" => (RunStatus::Running, PodPhase::Running),
        "SUCCEEDED" => (RunStatus::Done, PodPhase::Succeeded),
        "FAILED" => (RunStatus::Error, PodPhase::Failed),
        other => {
            tracing::warn!(executor_status = other, "unknown executor status, mapping to ERROR");
            (RunStatus::Error, PodPhase::Unknown)
        }
    }
}

/// Maps a pod phase to the run status exposed at the client boundary.
#[must_use]
pub const fn pod_phase_to_status(pod_phase: PodPhase) -> RunStatus {
    match pod_phase {
        PodPhase::Pending => RunStatus::Queued,
        PodPhase::Running => RunStatus::Running,
        PodPhase::Succeeded => RunStatus::Done,
        PodPhase::Failed | PodPhase::Unknown => RunStatus::Error,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
