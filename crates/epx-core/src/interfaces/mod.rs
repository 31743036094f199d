// epx-core/src/interfaces/mod.rs
// ============================================================================
// Module: EPX Interfaces
// Description: Backend-agnostic interfaces for persistence, storage, dispatch.
// Purpose: Define the contract surfaces used by the control-plane kernel.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the kernel integrates with the relational store, the
//! object store, and the batch executor without embedding backend-specific
//! details. Repositories are synchronous (the request model is blocking I/O
//! on a worker thread); the object-store and executor gateways are async and
//! awaited by the use-case layer. Implementations must fail closed on
//! missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::content::UploadContent;
use crate::core::job::Job;
use crate::core::job::JobStatus;
use crate::core::key_prefix::KeyPrefix;
use crate::core::run::Run;
use crate::core::run::RunStatus;
use crate::core::run::RunStatusDetail;
use crate::core::upload::JobUpload;
use crate::core::upload::UploadLocation;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Relational store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend-level failure (connection, SQL, mapping).
    #[error("store error: {0}")]
    Backend(String),
    /// A persisted row could not be mapped back to a domain entity.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Object-store failures.
///
/// Messages carried by [`StorageError::Io`] with `sanitized` set have passed
/// the credential scrubber and are safe to log or surface.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid request shape (bad key, bad URL, unsupported upload kind).
    #[error("invalid storage request: {0}")]
    Invalid(String),
    /// Backend I/O failure.
    #[error("object store error: {message}")]
    Io {
        /// Failure description.
        message: String,
        /// True when the message has been credential-scrubbed.
        sanitized: bool,
    },
}

/// Batch executor failures.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The run has not been dispatched, so it has no executor id.
    #[error("run has no batch executor id")]
    MissingExecutorId,
    /// Executor API failure at submit or cancel time.
    #[error("batch executor error: {0}")]
    Api(String),
}

// ============================================================================
// SECTION: Repositories
// ============================================================================

/// Persistence operations for jobs.
///
/// `save` inserts when the job has no id and upserts otherwise, returning the
/// persisted form with repository-assigned fields populated. Each call is
/// atomic; callers order validation before writes.
pub trait JobRepository: Send + Sync {
    /// Persists a job and returns the stored form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn save(&self, job: &Job) -> Result<Job, StoreError>;

    /// Finds a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_id(&self, job_id: i64) -> Result<Option<Job>, StoreError>;

    /// Finds all jobs owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Job>, StoreError>;

    /// Finds all jobs holding a status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;

    /// Lists jobs ordered by creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_all(&self, limit: Option<u64>, offset: u64) -> Result<Vec<Job>, StoreError>;

    /// Returns true when a job with the id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn exists(&self, job_id: i64) -> Result<bool, StoreError>;

    /// Deletes a job, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete(&self, job_id: i64) -> Result<bool, StoreError>;
}

/// Persistence operations for runs.
///
/// Status comparisons use the canonical [`RunStatus`] projection; legacy
/// aliases are accepted on read and stored verbatim on write.
pub trait RunRepository: Send + Sync {
    /// Persists a run and returns the stored form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn save(&self, run: &Run) -> Result<Run, StoreError>;

    /// Finds a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_id(&self, run_id: i64) -> Result<Option<Run>, StoreError>;

    /// Finds all runs for a job, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_job_id(&self, job_id: i64) -> Result<Vec<Run>, StoreError>;

    /// Finds all runs owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Run>, StoreError>;

    /// Finds all runs whose status canonically equals `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError>;

    /// Returns true when a run with the id exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn exists(&self, run_id: i64) -> Result<bool, StoreError>;

    /// Deletes a run, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete(&self, run_id: i64) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Upload Location Gateway
// ============================================================================

/// Object-store gateway for brokered uploads.
#[async_trait]
pub trait UploadLocationGateway: Send + Sync {
    /// Issues a presigned PUT URL for an upload under the given key prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the upload kind is unsupported or the
    /// store rejects the request.
    async fn get_upload_location(
        &self,
        upload: &JobUpload,
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError>;

    /// Downloads and type-sniffs the object behind a location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the object is missing or unreadable.
    async fn read_content(&self, location: &UploadLocation) -> Result<UploadContent, StorageError>;

    /// Keeps the locations whose objects were last modified before
    /// `threshold`; missing objects are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store cannot be queried at all.
    async fn filter_by_age(
        &self,
        locations: Vec<UploadLocation>,
        threshold: OffsetDateTime,
    ) -> Result<Vec<UploadLocation>, StorageError>;

    /// Transitions objects to cold storage, optionally age-filtered first.
    ///
    /// Per-object failures are recorded on `location.errors`; the location is
    /// still included in the returned list. Empty input returns empty output
    /// without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the store cannot be reached at all.
    async fn archive_uploads(
        &self,
        locations: Vec<UploadLocation>,
        age_threshold: Option<OffsetDateTime>,
    ) -> Result<Vec<UploadLocation>, StorageError>;
}

// ============================================================================
// SECTION: Results Gateway
// ============================================================================

/// Object-store gateway for server-side results archives.
#[async_trait]
pub trait ResultsGateway: Send + Sync {
    /// Uploads a results archive with ambient credentials and returns the
    /// permanent (unsigned) object URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with a credential-scrubbed message on upload
    /// failure.
    async fn upload_results(
        &self,
        job_id: i64,
        run_id: i64,
        zip_bytes: &[u8],
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError>;

    /// Issues a presigned GET URL for a previously uploaded results archive.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the URL is unrecognizable or presigning
    /// fails.
    async fn get_download_url(
        &self,
        results_url: &str,
        expiration_seconds: u64,
    ) -> Result<UploadLocation, StorageError>;
}

// ============================================================================
// SECTION: Batch Executor Gateway
// ============================================================================

/// Gateway to the external batch executor.
#[async_trait]
pub trait BatchExecutorGateway: Send + Sync {
    /// Submits a run for execution and records the executor id on the run.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Api`] when submission fails; submission
    /// failures are fatal to the calling operation.
    async fn submit_run(&self, run: &mut Run) -> Result<(), ExecutorError>;

    /// Describes a dispatched run.
    ///
    /// Executor API failures degrade gracefully into a detail of
    /// `(ERROR, Unknown)` whose message carries the "AWS Batch API error"
    /// sentinel; only a missing executor id is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::MissingExecutorId`] when the run was never
    /// dispatched.
    async fn describe_run(&self, run: &Run) -> Result<RunStatusDetail, ExecutorError>;

    /// Terminates a dispatched run.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the run has no executor id or the
    /// terminate call fails.
    async fn cancel_run(&self, run: &Run) -> Result<(), ExecutorError>;
}
