// epx-core/src/core/job.rs
// ============================================================================
// Module: EPX Job Entity
// Description: Job domain entity and its lifecycle state machine.
// Purpose: Enforce the job status transition table and ownership invariants.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! A job is a user's submission to the control plane; it owns the artifact
//! key prefix (via its id and creation time) and carries zero or more runs.
//! Status transitions are validated here and nowhere else: repositories and
//! use cases call [`Job::update_status`] and treat a [`TransitionError`] as a
//! caller mistake, not a storage failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::timefmt;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// State machine violation for job status changes.
#[derive(Debug, Error)]
#[error("invalid job status transition {from} -> {to}")]
pub struct TransitionError {
    /// Status the job currently holds.
    pub from: JobStatus,
    /// Status the caller attempted to move to.
    pub to: JobStatus,
}

// ============================================================================
// SECTION: Job Status
// ============================================================================

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Registered but not yet submitted.
    Created,
    /// Input upload brokered; awaiting processing.
    Submitted,
    /// Runs are executing.
    Processing,
    /// All work finished successfully (terminal).
    Completed,
    /// Work failed (terminal).
    Failed,
    /// Cancelled by the user (terminal).
    Cancelled,
}

impl JobStatus {
    /// Returns the stored string enumerator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Submitted => "SUBMITTED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a stored string enumerator.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(Self::Created),
            "SUBMITTED" => Some(Self::Submitted),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true for terminal statuses.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true when the transition `self -> to` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Created, Self::Submitted)
            | (Self::Submitted, Self::Processing)
            | (Self::Processing, Self::Completed | Self::Failed)
            | (Self::Created | Self::Submitted | Self::Processing, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Job Entity
// ============================================================================

/// Job domain entity.
///
/// # Invariants
/// - `id` is `None` until the first persist and positive afterwards.
/// - `user_id` is positive.
/// - `status` only changes through [`Job::update_status`].
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Repository-assigned identifier (`None` until persisted).
    pub id: Option<i64>,
    /// Owning user identifier.
    pub user_id: i64,
    /// User-supplied tags in insertion order.
    pub tags: Vec<String>,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Creation time (UTC, second granularity).
    pub created_at: OffsetDateTime,
    /// Last mutation time (UTC, second granularity).
    pub updated_at: OffsetDateTime,
    /// Presigned PUT URL issued for the job input archive, when brokered.
    pub input_location: Option<String>,
    /// Presigned PUT URL issued for the job config, when brokered.
    pub config_location: Option<String>,
    /// Free-form metadata attached by callers.
    pub metadata: Map<String, Value>,
}

impl Job {
    /// Creates an unpersisted job in `CREATED` status.
    #[must_use]
    pub fn create_unpersisted(user_id: i64, tags: Vec<String>) -> Self {
        let now = timefmt::now_utc();
        Self {
            id: None,
            user_id,
            tags,
            status: JobStatus::Created,
            created_at: now,
            updated_at: now,
            input_location: None,
            config_location: None,
            metadata: Map::new(),
        }
    }

    /// Returns true once the repository has assigned an id.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns true while the job is in a non-terminal status.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Moves the job to `status`, validating against the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not allowed.
    pub fn update_status(&mut self, status: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(status) {
            return Err(TransitionError {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = timefmt::now_utc();
        Ok(())
    }

    /// Serializes the job for API and CLI consumers.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "userId": self.user_id,
            "tags": self.tags,
            "status": self.status.as_str(),
            "createdAt": timefmt::format_utc(self.created_at),
            "updatedAt": timefmt::format_utc(self.updated_at),
            "inputLocation": self.input_location,
            "configLocation": self.config_location,
            "metadata": Value::Object(self.metadata.clone()),
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
