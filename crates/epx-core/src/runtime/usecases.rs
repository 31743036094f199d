// epx-core/src/runtime/usecases.rs
// ============================================================================
// Module: EPX Use Cases
// Description: Stateless orchestration functions for the job/run lifecycle.
// Purpose: Implement the kernel operations over injected repositories and
//          gateways.
// Dependencies: crate::core, crate::interfaces, regex, tracing
// ============================================================================

//! ## Overview
//! Each function here is a pure orchestration of (repositories, gateways,
//! inputs): validate first, write after, propagate typed errors with `?`.
//! Nothing in this module knows about HTTP, the CLI, or any concrete backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::content::UploadContent;
use crate::core::identity::IdentityToken;
use crate::core::identity::TokenError;
use crate::core::job::Job;
use crate::core::job::JobStatus;
use crate::core::key_prefix::KeyPrefix;
use crate::core::key_prefix::KeyPrefixError;
use crate::core::packaging;
use crate::core::packaging::PackagingError;
use crate::core::run::DEFAULT_CLIENT_VERSION;
use crate::core::run::Run;
use crate::core::run::RunStatus;
use crate::core::timefmt;
use crate::core::upload::JobUpload;
use crate::core::upload::UploadContext;
use crate::core::upload::UploadError;
use crate::core::upload::UploadLocation;
use crate::core::upload::UploadType;
use crate::interfaces::JobRepository;
use crate::interfaces::ResultsGateway;
use crate::interfaces::RunRepository;
use crate::interfaces::StorageError;
use crate::interfaces::StoreError;
use crate::interfaces::UploadLocationGateway;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures surfaced by the use-case layer.
#[derive(Debug, Error)]
pub enum UseCaseError {
    /// Bad input shape, bad token, unknown context/type, non-positive id.
    #[error("{0}")]
    Validation(String),
    /// A referenced job or run does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Job state machine violation.
    #[error("{0}")]
    InvalidTransition(String),
    /// Relational store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Object-store failure (credential-scrubbed where applicable).
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<TokenError> for UseCaseError {
    fn from(err: TokenError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<UploadError> for UseCaseError {
    fn from(err: UploadError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<KeyPrefixError> for UseCaseError {
    fn from(err: KeyPrefixError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PackagingError> for UseCaseError {
    fn from(err: PackagingError) -> Self {
        Self::Validation(err.to_string())
    }
}

// ============================================================================
// SECTION: Client Version
// ============================================================================

/// Semantic-version pattern extracted from user-agent strings.
static VERSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+(?:\.\d+)*").ok());

/// Extracts a semantic version from a client user-agent value.
///
/// Strings like `epx_client_1.2.2` yield `1.2.2`; unparseable values fall
/// back to the default version with a warning.
#[must_use]
pub fn parse_client_version(epx_version: &str) -> String {
    if epx_version.is_empty() {
        tracing::warn!("empty client version provided, using default {DEFAULT_CLIENT_VERSION}");
        return DEFAULT_CLIENT_VERSION.to_owned();
    }
    if let Some(pattern) = VERSION_PATTERN.as_ref()
        && let Some(found) = pattern.find(epx_version)
    {
        return found.as_str().to_owned();
    }
    tracing::warn!(
        epx_version,
        "could not parse client version, using default {DEFAULT_CLIENT_VERSION}"
    );
    DEFAULT_CLIENT_VERSION.to_owned()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a job or fails with the canonical not-found message.
fn require_job(job_repository: &dyn JobRepository, job_id: i64) -> Result<Job, UseCaseError> {
    job_repository
        .find_by_id(job_id)?
        .ok_or_else(|| UseCaseError::NotFound(format!("Job {job_id} not found")))
}

/// Loads a run or fails with the canonical not-found message.
fn require_run(run_repository: &dyn RunRepository, run_id: i64) -> Result<Run, UseCaseError> {
    run_repository
        .find_by_id(run_id)?
        .ok_or_else(|| UseCaseError::NotFound(format!("Run {run_id} not found")))
}

// ============================================================================
// SECTION: Job Registration and Submission
// ============================================================================

/// Registers a new job for the token's user.
///
/// # Errors
///
/// Returns [`UseCaseError`] on token or store failures.
pub fn register_job(
    job_repository: &dyn JobRepository,
    user_token_value: &str,
    tags: Vec<String>,
) -> Result<Job, UseCaseError> {
    let token = IdentityToken::from_bearer(user_token_value)?;
    let job = Job::create_unpersisted(token.user_id, tags);
    let persisted = job_repository.save(&job)?;
    tracing::info!(job_id = persisted.id, user_id = token.user_id, "job registered");
    Ok(persisted)
}

/// Brokers the job input upload and moves the job to `SUBMITTED`.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the job is missing, not in `CREATED`, or the
/// store/gateway fails.
pub async fn submit_job(
    job_repository: &dyn JobRepository,
    upload_gateway: &dyn UploadLocationGateway,
    job_upload: &JobUpload,
) -> Result<UploadLocation, UseCaseError> {
    let mut job = require_job(job_repository, job_upload.job_id)?;
    if job.status != JobStatus::Created {
        return Err(UseCaseError::InvalidTransition(format!(
            "Job {} must be in CREATED status to be submitted, current status: {}",
            job_upload.job_id, job.status
        )));
    }
    let prefix = KeyPrefix::from_job(&job)?;
    let location = upload_gateway.get_upload_location(job_upload, &prefix).await?;

    match job_upload.upload_type {
        UploadType::Input => job.input_location = Some(location.url.clone()),
        UploadType::Config => job.config_location = Some(location.url.clone()),
        _ => {}
    }
    job.update_status(JobStatus::Submitted)
        .map_err(|err| UseCaseError::InvalidTransition(err.to_string()))?;
    job_repository.save(&job)?;

    tracing::info!(
        job_id = job_upload.job_id,
        context = %job_upload.context,
        upload_type = job_upload.upload_type.as_str(),
        url = %location.sanitized_url(),
        "job submitted"
    );
    Ok(location)
}

/// Brokers the job configuration upload without a state check.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the job is missing or the store/gateway
/// fails.
pub async fn submit_job_config(
    job_repository: &dyn JobRepository,
    upload_gateway: &dyn UploadLocationGateway,
    job_upload: &JobUpload,
) -> Result<UploadLocation, UseCaseError> {
    let mut job = require_job(job_repository, job_upload.job_id)?;
    let prefix = KeyPrefix::from_job(&job)?;
    let location = upload_gateway.get_upload_location(job_upload, &prefix).await?;
    job.config_location = Some(location.url.clone());
    job.updated_at = timefmt::now_utc();
    job_repository.save(&job)?;
    tracing::info!(
        job_id = job_upload.job_id,
        url = %location.sanitized_url(),
        "job config upload brokered"
    );
    Ok(location)
}

/// Brokers the per-run configuration upload for an existing run.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the run or its job is missing or the
/// store/gateway fails.
pub async fn submit_run_config(
    job_repository: &dyn JobRepository,
    run_repository: &dyn RunRepository,
    upload_gateway: &dyn UploadLocationGateway,
    job_upload: &JobUpload,
) -> Result<UploadLocation, UseCaseError> {
    let run_id = job_upload
        .run_id
        .ok_or_else(|| UseCaseError::Validation("run uploads require a run id".to_owned()))?;
    let mut run = require_run(run_repository, run_id)?;
    let job = require_job(job_repository, run.job_id)?;
    let prefix = KeyPrefix::from_job(&job)?;
    let location = upload_gateway.get_upload_location(job_upload, &prefix).await?;
    run.config_url = Some(location.url.clone());
    run.updated_at = timefmt::now_utc();
    run_repository.save(&run)?;
    tracing::info!(run_id, url = %location.sanitized_url(), "run config upload brokered");
    Ok(location)
}

// ============================================================================
// SECTION: Run Submission
// ============================================================================

/// Persists one run per request and brokers each run's config upload.
///
/// Runs are created in the legacy `Submitted` status with phase `Pending`.
/// An empty request list returns empty without any repository writes.
///
/// # Errors
///
/// Returns [`UseCaseError`] on token, job lookup, store, or gateway failures.
pub async fn submit_runs(
    job_repository: &dyn JobRepository,
    run_repository: &dyn RunRepository,
    upload_gateway: &dyn UploadLocationGateway,
    run_requests: Vec<Value>,
    user_token_value: &str,
    epx_version: &str,
) -> Result<Vec<Run>, UseCaseError> {
    let token = IdentityToken::from_bearer(user_token_value)?;
    let epx_client_version = parse_client_version(epx_version);

    let mut persisted_runs = Vec::with_capacity(run_requests.len());
    for run_request in run_requests {
        let job_id = run_request
            .get("jobId")
            .and_then(Value::as_i64)
            .ok_or_else(|| UseCaseError::Validation("run request missing jobId".to_owned()))?;
        let job = require_job(job_repository, job_id)?;
        let prefix = KeyPrefix::from_job(&job)?;

        let run = Run::create_unpersisted(job_id, token.user_id, run_request, epx_client_version.clone());
        let mut persisted = run_repository.save(&run)?;
        let run_id = persisted
            .id
            .ok_or_else(|| StoreError::Backend("run save returned no id".to_owned()))?;

        let job_upload = JobUpload::new(UploadContext::Run, UploadType::Config, job_id, Some(run_id))?;
        let location = upload_gateway.get_upload_location(&job_upload, &prefix).await?;
        persisted.config_url = Some(location.url.clone());
        let finalized = run_repository.save(&persisted)?;
        persisted_runs.push(finalized);
    }
    Ok(persisted_runs)
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Returns all runs for a job, ordered by id.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the read fails.
pub fn get_runs_by_job_id(
    run_repository: &dyn RunRepository,
    job_id: i64,
) -> Result<Vec<Run>, UseCaseError> {
    Ok(run_repository.find_by_job_id(job_id)?)
}

/// Returns one job.
///
/// # Errors
///
/// Returns [`UseCaseError::NotFound`] when the job does not exist.
pub fn get_job(job_repository: &dyn JobRepository, job_id: i64) -> Result<Job, UseCaseError> {
    require_job(job_repository, job_id)
}

/// Lists jobs, newest first, optionally filtered to one user.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the read fails.
pub fn list_jobs(
    job_repository: &dyn JobRepository,
    limit: Option<u64>,
    offset: u64,
    user_id: Option<i64>,
) -> Result<Vec<Job>, UseCaseError> {
    match user_id {
        Some(user_id) => Ok(job_repository.find_by_user_id(user_id)?),
        None => Ok(job_repository.find_all(limit, offset)?),
    }
}

/// Enumerates the upload metadata recorded for a job and its runs.
///
/// # Errors
///
/// Returns [`UseCaseError::NotFound`] when the job does not exist.
pub fn get_job_uploads(
    job_repository: &dyn JobRepository,
    run_repository: &dyn RunRepository,
    job_id: i64,
) -> Result<Vec<JobUpload>, UseCaseError> {
    let job = require_job(job_repository, job_id)?;

    let mut uploads = Vec::new();
    if let Some(input_location) = &job.input_location {
        uploads.push(
            JobUpload::new(UploadContext::Job, UploadType::Input, job_id, None)?
                .with_location(UploadLocation::new(input_location.clone())),
        );
    }
    if let Some(config_location) = &job.config_location {
        uploads.push(
            JobUpload::new(UploadContext::Job, UploadType::Config, job_id, None)?
                .with_location(UploadLocation::new(config_location.clone())),
        );
    }
    for run in run_repository.find_by_job_id(job_id)? {
        if let (Some(run_id), Some(config_url)) = (run.id, &run.config_url) {
            uploads.push(
                JobUpload::new(UploadContext::Run, UploadType::Config, job_id, Some(run_id))?
                    .with_location(UploadLocation::new(config_url.clone())),
            );
        }
    }
    tracing::info!(job_id, upload_count = uploads.len(), "enumerated job uploads");
    Ok(uploads)
}

/// Reads and type-sniffs the object behind an upload location.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the object cannot be fetched or parsed.
pub async fn read_upload_content(
    upload_gateway: &dyn UploadLocationGateway,
    location: &UploadLocation,
) -> Result<UploadContent, UseCaseError> {
    Ok(upload_gateway.read_content(location).await?)
}

/// Writes fetched content to a local file.
///
/// Refuses to overwrite an existing file unless `force` is set.
///
/// # Errors
///
/// Returns [`UseCaseError::Validation`] on refusal or I/O failure.
pub fn write_to_local(path: &Path, content: &UploadContent, force: bool) -> Result<(), UseCaseError> {
    if path.exists() && !force {
        return Err(UseCaseError::Validation(format!(
            "file already exists: {} (pass force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            UseCaseError::Validation(format!("failed to create {}: {err}", parent.display()))
        })?;
    }
    std::fs::write(path, content.as_bytes())
        .map_err(|err| UseCaseError::Validation(format!("failed to write {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Archival
// ============================================================================

/// Archives upload locations, optionally age-filtered, with dry-run support.
///
/// Locations are deduplicated preserving order before any store call; an
/// empty input returns empty without touching the store.
///
/// # Errors
///
/// Returns [`UseCaseError`] when the gateway cannot be reached at all.
pub async fn archive_uploads(
    upload_gateway: &dyn UploadLocationGateway,
    upload_locations: Vec<UploadLocation>,
    age_threshold: Option<OffsetDateTime>,
    dry_run: bool,
) -> Result<Vec<UploadLocation>, UseCaseError> {
    if upload_locations.is_empty() {
        tracing::info!("no upload locations provided for archival");
        return Ok(Vec::new());
    }

    // Dedupe while preserving order; already-archived duplicates would only
    // add store calls and error noise.
    let mut seen = std::collections::HashSet::new();
    let upload_locations: Vec<UploadLocation> = upload_locations
        .into_iter()
        .filter(|location| seen.insert(location.url.clone()))
        .collect();

    if dry_run {
        let candidates = match age_threshold {
            Some(threshold) => upload_gateway.filter_by_age(upload_locations, threshold).await?,
            None => upload_locations,
        };
        tracing::info!(count = candidates.len(), "dry run: uploads that would be archived");
        return Ok(candidates);
    }

    let archived = upload_gateway.archive_uploads(upload_locations, age_threshold).await?;
    tracing::info!(count = archived.len(), "archived uploads");
    Ok(archived)
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Packages a results directory and uploads it as the run's results archive.
///
/// On success the run carries the clean (unsigned) results URL, the upload
/// time, and `DONE` status.
///
/// # Errors
///
/// Returns [`UseCaseError`] on validation, packaging, store, or storage
/// failures.
pub async fn upload_results(
    job_repository: &dyn JobRepository,
    run_repository: &dyn RunRepository,
    results_gateway: &dyn ResultsGateway,
    job_id: i64,
    run_id: i64,
    results_dir: &Path,
) -> Result<String, UseCaseError> {
    let mut run = require_run(run_repository, run_id)?;
    if run.job_id != job_id {
        return Err(UseCaseError::Validation(format!(
            "Run {run_id} does not belong to job {job_id}"
        )));
    }
    let job = require_job(job_repository, job_id)?;
    let prefix = KeyPrefix::from_job(&job)?;

    let packaged = packaging::package_directory(results_dir)?;
    tracing::info!(
        job_id,
        run_id,
        file_count = packaged.file_count,
        total_bytes = packaged.total_bytes,
        "packaged results directory"
    );

    let location = results_gateway
        .upload_results(job_id, run_id, &packaged.bytes, &prefix)
        .await?;

    let clean_url = location.url.split('?').next().unwrap_or(&location.url).to_owned();
    run.results_url = Some(clean_url.clone());
    run.results_uploaded_at = Some(timefmt::now_utc());
    run.status = RunStatus::Done;
    run.updated_at = timefmt::now_utc();
    run_repository.save(&run)?;

    tracing::info!(run_id, url = %clean_url, "results uploaded and run marked DONE");
    Ok(clean_url)
}

/// One row of `get_run_results` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResults {
    /// Run identifier.
    pub run_id: i64,
    /// Presigned download URL for the run's results archive.
    pub url: String,
}

impl RunResults {
    /// Serializes the row for API responses.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({ "run_id": self.run_id, "url": self.url })
    }
}

/// Issues presigned download URLs for every run of a job.
///
/// The canonical results URL is reconstructed from the job's key prefix;
/// any persisted `results_url` is ignored. No repository writes occur.
///
/// # Errors
///
/// Returns [`UseCaseError`] on lookup or presigning failures.
pub async fn get_run_results(
    job_repository: &dyn JobRepository,
    run_repository: &dyn RunRepository,
    results_gateway: &dyn ResultsGateway,
    job_id: i64,
    bucket_name: &str,
    expiration_seconds: u64,
) -> Result<Vec<RunResults>, UseCaseError> {
    let job = require_job(job_repository, job_id)?;
    let prefix = KeyPrefix::from_job(&job)?;

    let mut results = Vec::new();
    for run in run_repository.find_by_job_id(job_id)? {
        let Some(run_id) = run.id else { continue };
        let canonical_url = format!(
            "https://{bucket_name}.s3.amazonaws.com/{}",
            prefix.run_results_key(run_id)
        );
        let location = results_gateway
            .get_download_url(&canonical_url, expiration_seconds)
            .await?;
        results.push(RunResults {
            run_id,
            url: location.url,
        });
    }
    Ok(results)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
