// epx-core/src/core/key_prefix.rs
// ============================================================================
// Module: EPX Key Prefix
// Description: Canonical object-store key derivation for job artifacts.
// Purpose: Bind every artifact of a job to one prefix derived from creation
//          time so uploads seconds apart cannot drift into new directories.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! [`KeyPrefix`] is a frozen value object computed from `(job.id,
//! job.created_at)`. It is never persisted; every artifact key (job config,
//! job input, per-run config/results/logs) derives from it on demand, so the
//! job's creation timestamp is the single source of truth for object paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::job::Job;
use crate::core::upload::JobUpload;
use crate::core::upload::UploadContext;
use crate::core::upload::UploadType;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key derivation failures.
#[derive(Debug, Error)]
pub enum KeyPrefixError {
    /// The job has not been persisted yet, so it has no id to key under.
    #[error("cannot derive a key prefix for an unpersisted job")]
    UnpersistedJob,
    /// The upload kind has no brokered artifact key.
    #[error("no artifact key for {context}/{upload_type} uploads")]
    UnsupportedUpload {
        /// Upload context of the rejected request.
        context: UploadContext,
        /// Upload type of the rejected request.
        upload_type: UploadType,
    },
    /// A run-scoped key was requested without a run id.
    #[error("run uploads require a run id")]
    MissingRunId,
}

// ============================================================================
// SECTION: Key Prefix
// ============================================================================

/// Canonical object-store prefix for one job's artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPrefix {
    /// Job identifier.
    job_id: i64,
    /// Job creation time (UTC).
    timestamp: OffsetDateTime,
}

impl KeyPrefix {
    /// Derives the prefix from a persisted job.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPrefixError::UnpersistedJob`] when the job has no id.
    pub fn from_job(job: &Job) -> Result<Self, KeyPrefixError> {
        let job_id = job.id.ok_or(KeyPrefixError::UnpersistedJob)?;
        Ok(Self {
            job_id,
            timestamp: job.created_at,
        })
    }

    /// Returns the base prefix `jobs/{id}/{yyyy}/{mm}/{dd}/{HHMMSS}`.
    #[must_use]
    pub fn base_prefix(&self) -> String {
        let date = self.timestamp.date();
        let clock = self.timestamp.time();
        format!(
            "jobs/{}/{:04}/{:02}/{:02}/{:02}{:02}{:02}",
            self.job_id,
            date.year(),
            u8::from(date.month()),
            date.day(),
            clock.hour(),
            clock.minute(),
            clock.second()
        )
    }

    /// Returns the key for the job configuration file.
    #[must_use]
    pub fn job_config_key(&self) -> String {
        format!("{}/job_config.json", self.base_prefix())
    }

    /// Returns the key for the job input archive.
    #[must_use]
    pub fn job_input_key(&self) -> String {
        format!("{}/job_input.zip", self.base_prefix())
    }

    /// Returns the key for a run configuration file.
    #[must_use]
    pub fn run_config_key(&self, run_id: i64) -> String {
        format!("{}/run_{run_id}_config.json", self.base_prefix())
    }

    /// Returns the key for a run results archive.
    #[must_use]
    pub fn run_results_key(&self, run_id: i64) -> String {
        format!("{}/run_{run_id}_results.zip", self.base_prefix())
    }

    /// Returns the key for a run log file.
    #[must_use]
    pub fn run_logs_key(&self, run_id: i64) -> String {
        format!("{}/run_{run_id}_logs.log", self.base_prefix())
    }

    /// Routes an upload descriptor to its artifact key.
    ///
    /// Run `output` uploads have no brokered key and are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPrefixError`] for unsupported pairs or a missing run id.
    pub fn artifact_key(&self, upload: &JobUpload) -> Result<String, KeyPrefixError> {
        match (upload.context, upload.upload_type) {
            (UploadContext::Job, UploadType::Config) => Ok(self.job_config_key()),
            (UploadContext::Job, UploadType::Input) => Ok(self.job_input_key()),
            (UploadContext::Run, UploadType::Config) => {
                let run_id = upload.run_id.ok_or(KeyPrefixError::MissingRunId)?;
                Ok(self.run_config_key(run_id))
            }
            (UploadContext::Run, UploadType::Results) => {
                let run_id = upload.run_id.ok_or(KeyPrefixError::MissingRunId)?;
                Ok(self.run_results_key(run_id))
            }
            (UploadContext::Run, UploadType::Logs) => {
                let run_id = upload.run_id.ok_or(KeyPrefixError::MissingRunId)?;
                Ok(self.run_logs_key(run_id))
            }
            (context, upload_type) => Err(KeyPrefixError::UnsupportedUpload {
                context,
                upload_type,
            }),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
