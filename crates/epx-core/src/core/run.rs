// epx-core/src/core/run.rs
// ============================================================================
// Module: EPX Run Entity
// Description: Run domain entity, run status, and pod phase models.
// Purpose: Keep run status and pod phase consistent and serialize run views.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! A run is one execution of the simulator with a specific parameter set. The
//! status enum carries legacy aliases (`Submitted`, `Failed`, `Cancelled`)
//! that exist only to round-trip historical records; [`RunStatus::canonical`]
//! projects them onto the canonical set before anything reaches a client.
//! Status and pod phase always change together via [`Run::update_status`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use time::OffsetDateTime;

use crate::core::timefmt;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Default client version recorded when the user agent is unparseable.
pub const DEFAULT_CLIENT_VERSION: &str = "1.2.2";

/// Lifecycle status of a run.
///
/// # Invariants
/// - Legacy aliases are accepted on read and may be written at rest, but
///   serializers only emit canonical values to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Queued for execution.
    Queued,
    /// Accepted but not yet scheduled.
    NotStarted,
    /// Actively executing.
    Running,
    /// Finished successfully.
    Done,
    /// Failed or terminated.
    Error,
    /// Legacy alias for [`RunStatus::Queued`].
    Submitted,
    /// Legacy alias for [`RunStatus::Error`].
    Failed,
    /// Legacy alias for [`RunStatus::Error`].
    Cancelled,
}

impl RunStatus {
    /// Returns the stored string enumerator (legacy aliases keep their
    /// historical mixed-case forms).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::NotStarted => "NOT_STARTED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
            Self::Submitted => "Submitted",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Parses a stored string enumerator, accepting legacy aliases.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUEUED" => Some(Self::Queued),
            "NOT_STARTED" => Some(Self::NotStarted),
            "RUNNING" => Some(Self::Running),
            "DONE" => Some(Self::Done),
            "ERROR" => Some(Self::Error),
            "Submitted" => Some(Self::Submitted),
            "Failed" => Some(Self::Failed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Projects legacy aliases onto the canonical status set.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::Submitted => Self::Queued,
            Self::Failed | Self::Cancelled => Self::Error,
            other => other,
        }
    }

    /// Returns true when two statuses agree after alias projection.
    #[must_use]
    pub fn canonically_eq(self, other: Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Pod Phase
// ============================================================================

/// Execution phase reported for the run's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodPhase {
    /// Waiting to be scheduled.
    Pending,
    /// Container is executing.
    Running,
    /// Container exited successfully.
    Succeeded,
    /// Container failed.
    Failed,
    /// Phase could not be determined.
    Unknown,
}

impl PodPhase {
    /// Returns the stored string enumerator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a stored string enumerator.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Running" => Some(Self::Running),
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Status Detail
// ============================================================================

/// Executor-reported status for one run, as returned by the batch gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatusDetail {
    /// Mapped run status.
    pub status: RunStatus,
    /// Mapped pod phase.
    pub pod_phase: PodPhase,
    /// Human-readable detail, including the degradation sentinel on executor
    /// API failure.
    pub message: String,
}

// ============================================================================
// SECTION: Run Entity
// ============================================================================

/// Run domain entity.
///
/// # Invariants
/// - `job_id` refers to an existing job.
/// - `results_url`, `results_uploaded_at`, and `status == DONE` are set
///   together by the results upload path.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Repository-assigned identifier (`None` until persisted).
    pub id: Option<i64>,
    /// Parent job identifier.
    pub job_id: i64,
    /// Owning user identifier.
    pub user_id: i64,
    /// Full submission payload, stored verbatim.
    pub request: Value,
    /// Current run status (may hold a legacy alias at rest).
    pub status: RunStatus,
    /// Current pod phase.
    pub pod_phase: PodPhase,
    /// Raw container status string, when the executor reports one.
    pub container_status: Option<String>,
    /// Client version extracted from the submitting user agent.
    pub epx_client_version: String,
    /// Presigned PUT URL for this run's config file, once brokered.
    pub config_url: Option<String>,
    /// Permanent object-store URL of the uploaded results archive.
    pub results_url: Option<String>,
    /// Time the results archive was uploaded.
    pub results_uploaded_at: Option<OffsetDateTime>,
    /// Opaque executor identifier assigned on dispatch.
    pub batch_executor_id: Option<String>,
    /// Soft-delete marker controlled by the client.
    pub user_deleted: bool,
    /// Creation time (UTC, second granularity).
    pub created_at: OffsetDateTime,
    /// Last mutation time (UTC, second granularity).
    pub updated_at: OffsetDateTime,
}

impl Run {
    /// Creates an unpersisted run for a submission payload.
    ///
    /// New runs start in the legacy `Submitted` status with phase `Pending`,
    /// matching what historical records hold; clients observe `QUEUED`.
    #[must_use]
    pub fn create_unpersisted(
        job_id: i64,
        user_id: i64,
        request: Value,
        epx_client_version: String,
    ) -> Self {
        let now = timefmt::now_utc();
        Self {
            id: None,
            job_id,
            user_id,
            request,
            status: RunStatus::Submitted,
            pod_phase: PodPhase::Pending,
            container_status: None,
            epx_client_version,
            config_url: None,
            results_url: None,
            results_uploaded_at: None,
            batch_executor_id: None,
            user_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true once the repository has assigned an id.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Replaces status and pod phase atomically.
    pub fn update_status(&mut self, status: RunStatus, pod_phase: PodPhase) {
        self.status = status;
        self.pod_phase = pod_phase;
        self.updated_at = timefmt::now_utc();
    }

    /// Serializes the run for `GET /runs` consumers.
    ///
    /// Legacy status aliases are projected to canonical values; key casing
    /// follows the established wire contract (camelCase core fields, snake
    /// case for the late-added URL fields).
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "jobId": self.job_id,
            "userId": self.user_id,
            "createdTs": timefmt::format_utc(self.created_at),
            "request": self.request,
            "podPhase": self.pod_phase.as_str(),
            "containerStatus": self.container_status,
            "status": self.status.canonical().as_str(),
            "userDeleted": self.user_deleted,
            "epxClientVersion": self.epx_client_version,
            "config_url": self.config_url,
            "results_url": self.results_url,
            "results_uploaded_at": self.results_uploaded_at.map(timefmt::format_utc),
        })
    }

    /// Serializes the run for the `POST /runs` response.
    ///
    /// The submission response reports the raw stored status (`Submitted`
    /// for fresh runs), not the canonical projection.
    #[must_use]
    pub fn to_run_response_dict(&self) -> Value {
        serde_json::json!({
            "runId": self.id,
            "jobId": self.job_id,
            "status": self.status.as_str(),
            "errors": Value::Null,
            "runRequest": self.request,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
