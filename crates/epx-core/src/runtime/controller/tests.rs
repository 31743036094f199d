// epx-core/src/runtime/controller/tests.rs
// ============================================================================
// Module: Controller Tests
// Description: Unit tests for the controller facade and reconciliation loop.
// Purpose: Validate dispatch, rollback, reconciliation, and error mapping.
// Dependencies: async-trait, tokio
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;

use super::ControllerError;
use super::JobController;
use crate::core::content::UploadContent;
use crate::core::identity::IdentityToken;
use crate::core::key_prefix::KeyPrefix;
use crate::core::run::PodPhase;
use crate::core::run::Run;
use crate::core::run::RunStatus;
use crate::core::run::RunStatusDetail;
use crate::core::status_map::map_executor_status;
use crate::core::upload::JobUpload;
use crate::core::upload::UploadLocation;
use crate::interfaces::BatchExecutorGateway;
use crate::interfaces::ExecutorError;
use crate::interfaces::ResultsGateway;
use crate::interfaces::RunRepository;
use crate::interfaces::StorageError;
use crate::interfaces::UploadLocationGateway;
use crate::runtime::memory::InMemoryJobRepository;
use crate::runtime::memory::InMemoryRunRepository;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Upload gateway fake presigning against a fixed bucket.
struct FakeUploadGateway;

#[async_trait]
impl UploadLocationGateway for FakeUploadGateway {
    async fn get_upload_location(
        &self,
        upload: &JobUpload,
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        let key = prefix
            .artifact_key(upload)
            .map_err(|err| StorageError::Invalid(err.to_string()))?;
        Ok(UploadLocation::new(format!(
            "https://test-bucket.s3.amazonaws.com/{key}?X-Amz-Signature=testsig"
        )))
    }

    async fn read_content(&self, _location: &UploadLocation) -> Result<UploadContent, StorageError> {
        Ok(UploadContent::text("fake content"))
    }

    async fn filter_by_age(
        &self,
        locations: Vec<UploadLocation>,
        _threshold: OffsetDateTime,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        Ok(locations)
    }

    async fn archive_uploads(
        &self,
        locations: Vec<UploadLocation>,
        _age_threshold: Option<OffsetDateTime>,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        Ok(locations)
    }
}

/// Results gateway fake returning canonical permanent URLs.
struct FakeResultsGateway;

#[async_trait]
impl ResultsGateway for FakeResultsGateway {
    async fn upload_results(
        &self,
        _job_id: i64,
        run_id: i64,
        _zip_bytes: &[u8],
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        Ok(UploadLocation::new(format!(
            "https://test-bucket.s3.amazonaws.com/{}",
            prefix.run_results_key(run_id)
        )))
    }

    async fn get_download_url(
        &self,
        results_url: &str,
        expiration_seconds: u64,
    ) -> Result<UploadLocation, StorageError> {
        Ok(UploadLocation::new(format!(
            "{results_url}?X-Amz-Expires={expiration_seconds}"
        )))
    }
}

/// Scripted describe behavior for the batch gateway fake.
#[derive(Clone, Copy)]
enum DescribeBehavior {
    /// Map a fixed executor status string.
    Status(&'static str),
    /// Return the executor-unavailable degradation sentinel.
    Unavailable,
    /// Fail the describe call outright.
    Broken,
}

/// Batch gateway fake recording submissions.
struct FakeBatchGateway {
    /// Job names submitted so far.
    submitted: Mutex<Vec<String>>,
    /// Scripted describe behavior.
    describe: DescribeBehavior,
    /// Whether submissions fail.
    fail_submit: bool,
}

impl FakeBatchGateway {
    fn new(describe: DescribeBehavior) -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            describe,
            fail_submit: false,
        }
    }

    fn failing_submit() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            describe: DescribeBehavior::Unavailable,
            fail_submit: true,
        }
    }
}

#[async_trait]
impl BatchExecutorGateway for FakeBatchGateway {
    async fn submit_run(&self, run: &mut Run) -> Result<(), ExecutorError> {
        if self.fail_submit {
            return Err(ExecutorError::Api("simulated submit failure".to_owned()));
        }
        let run_id = run.id.ok_or(ExecutorError::MissingExecutorId)?;
        let job_name = format!("job-{}-run-{run_id}", run.job_id);
        self.submitted.lock().expect("lock").push(job_name.clone());
        run.batch_executor_id = Some(format!("executor-{job_name}"));
        Ok(())
    }

    async fn describe_run(&self, run: &Run) -> Result<RunStatusDetail, ExecutorError> {
        if run.batch_executor_id.is_none() {
            return Err(ExecutorError::MissingExecutorId);
        }
        match self.describe {
            DescribeBehavior::Status(status) => {
                let (run_status, pod_phase) = map_executor_status(status);
                Ok(RunStatusDetail {
                    status: run_status,
                    pod_phase,
                    message: format!("Job status: {status}"),
                })
            }
            DescribeBehavior::Unavailable => Ok(RunStatusDetail {
                status: RunStatus::Error,
                pod_phase: PodPhase::Unknown,
                message: "AWS Batch API error: connection refused".to_owned(),
            }),
            DescribeBehavior::Broken => Err(ExecutorError::Api("describe blew up".to_owned())),
        }
    }

    async fn cancel_run(&self, _run: &Run) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// Assembled controller plus the fakes it wraps.
struct Harness {
    controller: JobController,
    runs: Arc<InMemoryRunRepository>,
    batch: Arc<FakeBatchGateway>,
}

fn harness(describe: DescribeBehavior) -> Harness {
    harness_with_batch(Arc::new(FakeBatchGateway::new(describe)))
}

fn harness_with_batch(batch: Arc<FakeBatchGateway>) -> Harness {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let runs = Arc::new(InMemoryRunRepository::new());
    let controller = JobController::new(
        jobs,
        Arc::clone(&runs) as Arc<dyn RunRepository>,
        Arc::new(FakeUploadGateway),
        Arc::new(FakeResultsGateway),
        Arc::clone(&batch) as Arc<dyn BatchExecutorGateway>,
        "test-bucket".to_owned(),
    );
    Harness {
        controller,
        runs,
        batch,
    }
}

fn bearer() -> String {
    IdentityToken::generate_bearer(123, Some("abc123"))
}

// ============================================================================
// SECTION: Registration and Submission
// ============================================================================

#[tokio::test]
async fn register_then_submit_returns_a_presigned_url() {
    let harness = harness(DescribeBehavior::Unavailable);
    let job = harness.controller.register_job(&bearer(), vec!["info_job".to_owned()]).expect("register");
    assert_eq!(job["id"], 1);
    assert_eq!(job["userId"], 123);

    let response = harness
        .controller
        .submit_job(1, "job", "input", None)
        .await
        .expect("submit");
    let url = response["url"].as_str().expect("url");
    assert!(url.contains("/job_input.zip?"));
}

#[tokio::test]
async fn submit_job_rejects_unknown_context_type_pairs() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    let err = harness
        .controller
        .submit_job(1, "job", "results", None)
        .await
        .expect_err("bad pair");
    assert!(matches!(err, ControllerError::Rejected(_)));
}

#[tokio::test]
async fn submit_runs_dispatches_each_run_with_the_natural_key_name() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");

    let responses = harness
        .controller
        .submit_runs(&bearer(), vec![json!({"jobId": 1})], "epx_client_1.2.2")
        .await
        .expect("submit runs");

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["runId"], 1);
    assert_eq!(responses[0]["status"], "Submitted");
    assert_eq!(*harness.batch.submitted.lock().expect("lock"), vec!["job-1-run-1".to_owned()]);
    let stored = harness.runs.find_by_id(1).expect("find").expect("run");
    assert_eq!(stored.batch_executor_id.as_deref(), Some("executor-job-1-run-1"));
    assert!(stored.config_url.is_some());
}

#[tokio::test]
async fn submit_runs_rolls_back_when_dispatch_fails() {
    let harness = harness_with_batch(Arc::new(FakeBatchGateway::failing_submit()));
    harness.controller.register_job(&bearer(), vec![]).expect("register");

    let err = harness
        .controller
        .submit_runs(&bearer(), vec![json!({"jobId": 1})], "epx_client_1.2.2")
        .await
        .expect_err("dispatch failure");
    assert!(matches!(err, ControllerError::Internal(_)));
    assert!(err.to_string().starts_with("An unexpected error occurred"));
    // Compensation removed the half-submitted run.
    assert!(harness.runs.find_by_job_id(1).expect("runs").is_empty());
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Seeds one dispatched run in `(QUEUED, Pending)`.
async fn seed_dispatched_run(harness: &Harness) {
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    harness
        .controller
        .submit_runs(&bearer(), vec![json!({"jobId": 1})], "epx_client_1.2.2")
        .await
        .expect("submit runs");
    let mut run = harness.runs.find_by_id(1).expect("find").expect("run");
    run.update_status(RunStatus::Queued, PodPhase::Pending);
    harness.runs.save(&run).expect("seed status");
}

#[tokio::test]
async fn get_runs_applies_executor_transitions_and_persists_them() {
    let harness = harness(DescribeBehavior::Status("RUNNING"));
    seed_dispatched_run(&harness).await;

    let runs = harness.controller.get_runs(1).await.expect("get runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["status"], "RUNNING");
    assert_eq!(runs[0]["podPhase"], "Running");

    let stored = harness.runs.find_by_id(1).expect("find").expect("run");
    assert_eq!(stored.status, RunStatus::Running);
    assert_eq!(stored.pod_phase, PodPhase::Running);
}

#[tokio::test]
async fn get_runs_keeps_stored_state_when_the_executor_is_unavailable() {
    let harness = harness(DescribeBehavior::Unavailable);
    seed_dispatched_run(&harness).await;
    let mut run = harness.runs.find_by_id(1).expect("find").expect("run");
    run.update_status(RunStatus::Running, PodPhase::Running);
    harness.runs.save(&run).expect("seed running");
    let before = harness.runs.find_by_id(1).expect("find").expect("run");

    let runs = harness.controller.get_runs(1).await.expect("get runs");
    assert_eq!(runs[0]["status"], "RUNNING");
    assert_eq!(runs[0]["podPhase"], "Running");

    let after = harness.runs.find_by_id(1).expect("find").expect("run");
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn get_runs_survives_describe_exceptions() {
    let harness = harness(DescribeBehavior::Broken);
    seed_dispatched_run(&harness).await;

    let runs = harness.controller.get_runs(1).await.expect("get runs");
    assert_eq!(runs[0]["status"], "QUEUED");
    assert_eq!(runs[0]["podPhase"], "Pending");
}

#[tokio::test]
async fn get_runs_for_an_unknown_job_returns_an_empty_list() {
    let harness = harness(DescribeBehavior::Unavailable);
    let runs = harness.controller.get_runs(42).await.expect("get runs");
    assert!(runs.is_empty());
}

// ============================================================================
// SECTION: Uploads and Results
// ============================================================================

#[tokio::test]
async fn get_job_uploads_attaches_content_when_requested() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    harness.controller.submit_job(1, "job", "input", None).await.expect("submit");

    let uploads = harness.controller.get_job_uploads(1, true).await.expect("uploads");
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["content"]["type"], "text");
    // Sanitized location: signature query stripped.
    let url = uploads[0]["location"]["url"].as_str().expect("url");
    assert!(!url.contains('?'));
}

#[tokio::test]
async fn download_job_uploads_materializes_files() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    harness.controller.submit_job(1, "job", "input", None).await.expect("submit");

    let tmp = tempfile::TempDir::new().expect("tempdir");
    let path = harness
        .controller
        .download_job_uploads(1, tmp.path(), false)
        .await
        .expect("download");
    assert_eq!(path, tmp.path().display().to_string());
    let entries: Vec<_> = std::fs::read_dir(tmp.path()).expect("read dir").collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn download_job_uploads_rejects_jobs_without_uploads() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let err = harness
        .controller
        .download_job_uploads(1, tmp.path(), false)
        .await
        .expect_err("no uploads");
    assert!(err.to_string().contains("No uploads found"));
}

#[tokio::test]
async fn upload_results_round_trips_through_get_run_results() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    harness
        .controller
        .submit_runs(&bearer(), vec![json!({"jobId": 1})], "epx_client_1.2.2")
        .await
        .expect("submit runs");

    let tmp = tempfile::TempDir::new().expect("tempdir");
    let results_dir = tmp.path().join("RUN4");
    std::fs::create_dir_all(&results_dir).expect("mkdir");
    std::fs::write(results_dir.join("out.csv"), "a,b\n").expect("write");

    let url = harness
        .controller
        .upload_results_from_directory(1, 1, &results_dir)
        .await
        .expect("upload");
    assert!(url.ends_with("run_1_results.zip"));

    let results = harness.controller.get_run_results(1).await.expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["run_id"], 1);
    let download_url = results[0]["url"].as_str().expect("url");
    assert!(download_url.contains("run_1_results.zip"));
    assert!(download_url.contains("X-Amz-Expires=86400"));
}

#[tokio::test]
async fn archive_job_uploads_reports_sanitized_locations() {
    let harness = harness(DescribeBehavior::Unavailable);
    harness.controller.register_job(&bearer(), vec![]).expect("register");
    harness.controller.submit_job(1, "job", "input", None).await.expect("submit");

    let archived = harness
        .controller
        .archive_job_uploads(1, None, None, false)
        .await
        .expect("archive");
    assert_eq!(archived.len(), 1);
    let url = archived[0]["url"].as_str().expect("url");
    assert!(!url.contains("X-Amz-Signature"));
}
