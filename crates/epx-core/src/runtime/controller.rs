// epx-core/src/runtime/controller.rs
// ============================================================================
// Module: EPX Job Controller
// Description: Controller facade gluing use cases to the HTTP/CLI boundary.
// Purpose: Convert every kernel outcome into a two-armed result and run the
//          read-time status reconciliation loop.
// Dependencies: crate::interfaces, crate::runtime::usecases, tracing
// ============================================================================

//! ## Overview
//! [`JobController`] is the only surface the HTTP layer and the CLI talk to.
//! Every operation returns `Result<T, ControllerError>`: expected validation
//! failures propagate their message, everything else is logged and replaced
//! with a generic message so no internal detail crosses the boundary.
//! `get_runs` is the single point where executor reality reconverges with
//! stored state; there is no background poller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::run::RunStatus;
use crate::core::upload::JobUpload;
use crate::core::upload::UploadContext;
use crate::core::upload::UploadType;
use crate::interfaces::BatchExecutorGateway;
use crate::interfaces::JobRepository;
use crate::interfaces::ResultsGateway;
use crate::interfaces::RunRepository;
use crate::interfaces::UploadLocationGateway;
use crate::runtime::usecases;
use crate::runtime::usecases::UseCaseError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message substring marking the executor-unavailable degradation sentinel.
const EXECUTOR_UNAVAILABLE_SENTINEL: &str = "AWS Batch API error";

/// Presigned GET validity for results downloads.
const RESULTS_DOWNLOAD_EXPIRATION_SECONDS: u64 = 86_400;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure arm of every controller operation.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Expected failure whose message is safe to surface verbatim.
    #[error("{0}")]
    Rejected(String),
    /// Unexpected failure; the raw cause is logged, never surfaced.
    #[error("{0}")]
    Internal(String),
}

impl ControllerError {
    /// Converts a use-case error, hiding unexpected causes behind a generic
    /// message for the named operation.
    fn from_use_case(err: UseCaseError, operation: &str) -> Self {
        match err {
            UseCaseError::Validation(message)
            | UseCaseError::NotFound(message)
            | UseCaseError::InvalidTransition(message) => Self::Rejected(message),
            UseCaseError::Storage(storage) => Self::Rejected(storage.to_string()),
            UseCaseError::Store(store) => {
                tracing::error!(error = %store, operation, "store failure");
                Self::Internal(format!("An unexpected error occurred while {operation}"))
            }
        }
    }
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Facade over the use-case layer for one configured deployment.
pub struct JobController {
    /// Job persistence.
    job_repository: Arc<dyn JobRepository>,
    /// Run persistence.
    run_repository: Arc<dyn RunRepository>,
    /// Presigned-upload brokering.
    upload_gateway: Arc<dyn UploadLocationGateway>,
    /// Server-side results storage.
    results_gateway: Arc<dyn ResultsGateway>,
    /// Batch executor dispatch and status.
    batch_gateway: Arc<dyn BatchExecutorGateway>,
    /// Bucket hosting results archives (for canonical URL reconstruction).
    results_bucket: String,
}

impl JobController {
    /// Creates a controller over the injected backends.
    #[must_use]
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        run_repository: Arc<dyn RunRepository>,
        upload_gateway: Arc<dyn UploadLocationGateway>,
        results_gateway: Arc<dyn ResultsGateway>,
        batch_gateway: Arc<dyn BatchExecutorGateway>,
        results_bucket: String,
    ) -> Self {
        Self {
            job_repository,
            run_repository,
            upload_gateway,
            results_gateway,
            batch_gateway,
            results_bucket,
        }
    }

    /// Registers a new job for the token's user.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on invalid tokens or store failures.
    pub fn register_job(
        &self,
        user_token_value: &str,
        tags: Vec<String>,
    ) -> Result<Value, ControllerError> {
        usecases::register_job(self.job_repository.as_ref(), user_token_value, tags)
            .map(|job| job.to_dict())
            .map_err(|err| ControllerError::from_use_case(err, "registering the job"))
    }

    /// Brokers an upload for a job or run, routing on context and type.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] for unknown context/type pairs and any
    /// underlying failure.
    pub async fn submit_job(
        &self,
        job_id: i64,
        context: &str,
        upload_type: &str,
        run_id: Option<i64>,
    ) -> Result<Value, ControllerError> {
        let operation = "submitting the job";
        let parsed_context = UploadContext::parse(context)
            .map_err(|err| ControllerError::Rejected(err.to_string()))?;
        let parsed_type = UploadType::parse(upload_type)
            .map_err(|err| ControllerError::Rejected(err.to_string()))?;
        let upload = JobUpload::new(parsed_context, parsed_type, job_id, run_id)
            .map_err(|err| ControllerError::Rejected(err.to_string()))?;

        let location = match (parsed_context, parsed_type) {
            (UploadContext::Job, UploadType::Input) => {
                usecases::submit_job(self.job_repository.as_ref(), self.upload_gateway.as_ref(), &upload)
                    .await
            }
            (UploadContext::Job, UploadType::Config) => {
                usecases::submit_job_config(
                    self.job_repository.as_ref(),
                    self.upload_gateway.as_ref(),
                    &upload,
                )
                .await
            }
            (UploadContext::Run, UploadType::Config) => {
                usecases::submit_run_config(
                    self.job_repository.as_ref(),
                    self.run_repository.as_ref(),
                    self.upload_gateway.as_ref(),
                    &upload,
                )
                .await
            }
            _ => {
                return Err(ControllerError::Rejected(format!(
                    "Unsupported context '{context}' or job type '{upload_type}'"
                )));
            }
        }
        .map_err(|err| ControllerError::from_use_case(err, operation))?;

        Ok(location.to_dict())
    }

    /// Persists run submissions and dispatches each run to the executor.
    ///
    /// Dispatch failure rolls the persisted runs back so callers never see a
    /// half-submitted batch.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on validation, store, gateway, or
    /// dispatch failures.
    pub async fn submit_runs(
        &self,
        user_token_value: &str,
        run_requests: Vec<Value>,
        epx_version: &str,
    ) -> Result<Vec<Value>, ControllerError> {
        let operation = "submitting the runs";
        let mut runs = usecases::submit_runs(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            self.upload_gateway.as_ref(),
            run_requests,
            user_token_value,
            epx_version,
        )
        .await
        .map_err(|err| ControllerError::from_use_case(err, operation))?;

        let mut dispatch_failure: Option<String> = None;
        for run in &mut runs {
            match self.batch_gateway.submit_run(run).await {
                Ok(()) => match self.run_repository.save(run) {
                    Ok(saved) => *run = saved,
                    Err(err) => {
                        dispatch_failure = Some(err.to_string());
                        break;
                    }
                },
                Err(err) => {
                    dispatch_failure = Some(err.to_string());
                    break;
                }
            }
        }
        if let Some(cause) = dispatch_failure {
            tracing::error!(error = %cause, "run dispatch failed, rolling back submitted runs");
            self.rollback_runs(&runs);
            return Err(ControllerError::Internal(format!(
                "An unexpected error occurred while {operation}"
            )));
        }

        Ok(runs.iter().map(crate::core::run::Run::to_run_response_dict).collect())
    }

    /// Deletes the runs persisted by a failed `submit_runs`, best effort.
    fn rollback_runs(&self, runs: &[crate::core::run::Run]) {
        for run in runs {
            if let Some(run_id) = run.id
                && let Err(err) = self.run_repository.delete(run_id)
            {
                tracing::error!(run_id, error = %err, "failed to roll back run");
            }
        }
    }

    /// Returns all runs for a job, reconciling status against the executor.
    ///
    /// Executor outage is never fatal here: affected runs keep their stored
    /// status and the response is still a success.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the runs cannot be read at all.
    pub async fn get_runs(&self, job_id: i64) -> Result<Vec<Value>, ControllerError> {
        let operation = "retrieving the runs";
        let mut runs = usecases::get_runs_by_job_id(self.run_repository.as_ref(), job_id)
            .map_err(|err| ControllerError::from_use_case(err, operation))?;

        let mut updated_count = 0_usize;
        let mut failed_count = 0_usize;
        for run in &mut runs {
            match self.batch_gateway.describe_run(run).await {
                Ok(detail) => {
                    if detail.status == RunStatus::Error
                        && detail.message.contains(EXECUTOR_UNAVAILABLE_SENTINEL)
                    {
                        tracing::warn!(
                            run_id = run.id,
                            status = %run.status,
                            pod_phase = %run.pod_phase,
                            "executor unavailable, using stale stored status"
                        );
                        failed_count += 1;
                        continue;
                    }
                    if run.status != detail.status || run.pod_phase != detail.pod_phase {
                        tracing::info!(
                            run_id = run.id,
                            from_status = %run.status,
                            from_phase = %run.pod_phase,
                            to_status = %detail.status,
                            to_phase = %detail.pod_phase,
                            "run status transition"
                        );
                        run.update_status(detail.status, detail.pod_phase);
                        match self.run_repository.save(run) {
                            Ok(saved) => {
                                *run = saved;
                                updated_count += 1;
                            }
                            Err(err) => {
                                tracing::error!(run_id = run.id, error = %err, "failed to persist reconciled status");
                                failed_count += 1;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(run_id = run.id, error = %err, "error reconciling run status");
                    failed_count += 1;
                }
            }
        }
        tracing::info!(
            job_id,
            run_count = runs.len(),
            updated_count,
            failed_count,
            "status reconciliation finished"
        );

        Ok(runs.iter().map(crate::core::run::Run::to_dict).collect())
    }

    /// Issues presigned download URLs for every run of a job.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on lookup or presigning failures.
    pub async fn get_run_results(&self, job_id: i64) -> Result<Vec<Value>, ControllerError> {
        usecases::get_run_results(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            self.results_gateway.as_ref(),
            job_id,
            &self.results_bucket,
            RESULTS_DOWNLOAD_EXPIRATION_SECONDS,
        )
        .await
        .map(|results| results.iter().map(usecases::RunResults::to_dict).collect())
        .map_err(|err| ControllerError::from_use_case(err, "retrieving the run results"))
    }

    /// Returns upload metadata for a job, optionally with object content.
    ///
    /// Content fetch failures are recorded per upload instead of failing the
    /// whole listing.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the job does not exist or the
    /// metadata read fails.
    pub async fn get_job_uploads(
        &self,
        job_id: i64,
        include_content: bool,
    ) -> Result<Vec<Value>, ControllerError> {
        let operation = "retrieving uploads";
        let uploads = usecases::get_job_uploads(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            job_id,
        )
        .map_err(|err| ControllerError::from_use_case(err, operation))?;

        let mut results = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let mut dict = upload.to_sanitized_dict();
            if include_content && let Some(location) = &upload.location {
                match usecases::read_upload_content(self.upload_gateway.as_ref(), location).await {
                    Ok(content) => {
                        if let Some(map) = dict.as_object_mut() {
                            map.insert("content".to_owned(), content.to_dict());
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            job_id,
                            context = %upload.context,
                            upload_type = upload.upload_type.as_str(),
                            error = %err,
                            "failed to read upload content"
                        );
                        if let Some(map) = dict.as_object_mut() {
                            map.insert("error".to_owned(), Value::String(err.to_string()));
                        }
                    }
                }
            }
            results.push(dict);
        }
        Ok(results)
    }

    /// Downloads every upload of a job into a local directory.
    ///
    /// Existing files are skipped unless `force` is set; per-file failures
    /// are collected and only an all-file failure rejects the operation.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the job has no uploads or nothing
    /// could be downloaded.
    pub async fn download_job_uploads(
        &self,
        job_id: i64,
        base_path: &Path,
        force: bool,
    ) -> Result<String, ControllerError> {
        let operation = "downloading uploads";
        let uploads = usecases::get_job_uploads(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            job_id,
        )
        .map_err(|err| ControllerError::from_use_case(err, operation))?;
        if uploads.is_empty() {
            return Err(ControllerError::Rejected(format!("No uploads found for job {job_id}")));
        }

        std::fs::create_dir_all(base_path).map_err(|err| {
            ControllerError::Rejected(format!("failed to create {}: {err}", base_path.display()))
        })?;

        let mut downloaded = 0_usize;
        let mut skipped = 0_usize;
        let mut errors = Vec::new();
        for upload in &uploads {
            let Some(location) = &upload.location else { continue };
            let filename = location
                .extract_filename()
                .unwrap_or_else(|| upload.default_filename());
            let file_path = base_path.join(&filename);
            if file_path.exists() && !force {
                tracing::warn!(path = %file_path.display(), "skipping existing file");
                skipped += 1;
                continue;
            }
            let outcome = match usecases::read_upload_content(self.upload_gateway.as_ref(), location).await
            {
                Ok(content) => usecases::write_to_local(&file_path, &content, force),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {
                    tracing::info!(
                        context = %upload.context,
                        upload_type = upload.upload_type.as_str(),
                        path = %file_path.display(),
                        "downloaded upload"
                    );
                    downloaded += 1;
                }
                Err(err) => {
                    let message = format!(
                        "Failed to download {}_{}: {err}",
                        upload.context,
                        upload.upload_type.as_str()
                    );
                    tracing::warn!("{message}");
                    errors.push(message);
                }
            }
        }

        if downloaded == 0 && !errors.is_empty() {
            return Err(ControllerError::Rejected(format!(
                "Failed to download any files. Errors: {}",
                errors.join("; ")
            )));
        }
        tracing::info!(job_id, downloaded, skipped, error_count = errors.len(), "download finished");
        Ok(base_path.display().to_string())
    }

    /// Archives the uploads of a job, optionally age-filtered, with dry-run.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on lookup or store failures.
    pub async fn archive_job_uploads(
        &self,
        job_id: i64,
        days_since_create: Option<i64>,
        hours_since_create: Option<i64>,
        dry_run: bool,
    ) -> Result<Vec<Value>, ControllerError> {
        let operation = "archiving uploads";
        let uploads = usecases::get_job_uploads(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            job_id,
        )
        .map_err(|err| ControllerError::from_use_case(err, operation))?;
        if uploads.is_empty() {
            tracing::info!(job_id, "no uploads found to archive");
            return Ok(Vec::new());
        }

        let age_threshold = hours_since_create
            .map(|hours| OffsetDateTime::now_utc() - Duration::hours(hours))
            .or_else(|| days_since_create.map(|days| OffsetDateTime::now_utc() - Duration::days(days)));

        let locations = uploads.into_iter().filter_map(|upload| upload.location).collect();
        let archived = usecases::archive_uploads(
            self.upload_gateway.as_ref(),
            locations,
            age_threshold,
            dry_run,
        )
        .await
        .map_err(|err| ControllerError::from_use_case(err, operation))?;

        Ok(archived
            .iter()
            .map(crate::core::upload::UploadLocation::to_sanitized_dict)
            .collect())
    }

    /// Packages and uploads a results directory for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on validation, packaging, or storage
    /// failures.
    pub async fn upload_results_from_directory(
        &self,
        job_id: i64,
        run_id: i64,
        results_dir: &Path,
    ) -> Result<String, ControllerError> {
        usecases::upload_results(
            self.job_repository.as_ref(),
            self.run_repository.as_ref(),
            self.results_gateway.as_ref(),
            job_id,
            run_id,
            results_dir,
        )
        .await
        .map_err(|err| ControllerError::from_use_case(err, "uploading results"))
    }

    /// Returns one job's serialized form.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the job does not exist.
    pub fn get_job(&self, job_id: i64) -> Result<Value, ControllerError> {
        usecases::get_job(self.job_repository.as_ref(), job_id)
            .map(|job| job.to_dict())
            .map_err(|err| ControllerError::from_use_case(err, "retrieving the job"))
    }

    /// Lists jobs, newest first, optionally filtered to one user.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] on store failures.
    pub fn list_jobs(
        &self,
        limit: Option<u64>,
        offset: u64,
        user_id: Option<i64>,
    ) -> Result<Vec<Value>, ControllerError> {
        usecases::list_jobs(self.job_repository.as_ref(), limit, offset, user_id)
            .map(|jobs| jobs.iter().map(crate::core::job::Job::to_dict).collect())
            .map_err(|err| ControllerError::from_use_case(err, "listing jobs"))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
