// epx-gateways/src/batch.rs
// ============================================================================
// Module: EPX Batch Executor Gateway
// Description: Dispatch, status, and termination against AWS Batch.
// Purpose: Submit runs, map executor status, and degrade gracefully on
//          executor outage.
// Dependencies: aws-sdk-batch, epx-core
// ============================================================================

//! ## Overview
//! Runs dispatch as batch jobs named `job-{job_id}-run-{run_id}` with
//! `JOB_ID` and `RUN_ID` injected into the container environment; the
//! returned executor id is recorded on the run and is the only handle used
//! afterwards. `describe_run` never fails on executor outage: API errors map
//! to an `(ERROR, Unknown)` detail carrying the "AWS Batch API error"
//! sentinel, which readers treat as "keep the stored status".

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_batch::Client;
use aws_sdk_batch::types::ContainerOverrides;
use aws_sdk_batch::types::KeyValuePair;
use epx_core::BatchExecutorGateway;
use epx_core::core::run::PodPhase;
use epx_core::core::run::Run;
use epx_core::core::run::RunStatus;
use epx_core::core::run::RunStatusDetail;
use epx_core::core::status_map::map_executor_status;
use epx_core::interfaces::ExecutorError;

use crate::scrub::scrub_credentials;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Termination reason recorded for cancelled runs.
const CANCELLATION_REASON: &str = "User requested cancellation";

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Batch executor client bound to one queue and job definition.
pub struct AwsBatchGateway {
    /// Batch client handle.
    client: Client,
    /// Queue runs are submitted to.
    job_queue: String,
    /// Job definition runs execute under.
    job_definition: String,
}

impl AwsBatchGateway {
    /// Connects the gateway using the ambient credential chain.
    pub async fn connect(
        job_queue: impl Into<String>,
        job_definition: impl Into<String>,
        region: Option<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self {
            client: Client::new(&config),
            job_queue: job_queue.into(),
            job_definition: job_definition.into(),
        }
    }

    /// Creates a gateway over an existing client, for alternate wiring.
    #[must_use]
    pub fn with_client(
        client: Client,
        job_queue: impl Into<String>,
        job_definition: impl Into<String>,
    ) -> Self {
        Self {
            client,
            job_queue: job_queue.into(),
            job_definition: job_definition.into(),
        }
    }

    /// Returns the degradation sentinel for an executor API failure.
    fn unavailable(message: impl std::fmt::Display) -> RunStatusDetail {
        RunStatusDetail {
            status: RunStatus::Error,
            pod_phase: PodPhase::Unknown,
            message: format!("AWS Batch API error: {}", scrub_credentials(&message.to_string())),
        }
    }
}

#[async_trait]
impl BatchExecutorGateway for AwsBatchGateway {
    async fn submit_run(&self, run: &mut Run) -> Result<(), ExecutorError> {
        let run_id = run.id.ok_or(ExecutorError::MissingExecutorId)?;
        let job_name = format!("job-{}-run-{run_id}", run.job_id);
        let overrides = ContainerOverrides::builder()
            .environment(
                KeyValuePair::builder()
                    .name("JOB_ID")
                    .value(run.job_id.to_string())
                    .build(),
            )
            .environment(
                KeyValuePair::builder()
                    .name("RUN_ID")
                    .value(run_id.to_string())
                    .build(),
            )
            .build();
        let response = self
            .client
            .submit_job()
            .job_name(&job_name)
            .job_queue(&self.job_queue)
            .job_definition(&self.job_definition)
            .container_overrides(overrides)
            .send()
            .await
            .map_err(|err| ExecutorError::Api(scrub_credentials(&err.to_string())))?;
        let executor_id = response
            .job_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ExecutorError::Api("submit response carried no job id".to_owned()))?;
        tracing::info!(job_name, executor_id, "submitted run to batch executor");
        run.batch_executor_id = Some(executor_id);
        Ok(())
    }

    async fn describe_run(&self, run: &Run) -> Result<RunStatusDetail, ExecutorError> {
        let executor_id = run
            .batch_executor_id
            .as_deref()
            .ok_or(ExecutorError::MissingExecutorId)?;
        let response = match self
            .client
            .describe_jobs()
            .jobs(executor_id)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Ok(Self::unavailable(err)),
        };
        let Some(detail) = response.jobs().first() else {
            return Ok(Self::unavailable(format!("job {executor_id} not found")));
        };
        let Some(status) = detail.status() else {
            return Ok(Self::unavailable(format!("job {executor_id} reported no status")));
        };
        let status_str = status.as_str();
        let (run_status, pod_phase) = map_executor_status(status_str);
        let message = detail
            .status_reason()
            .map_or_else(|| format!("Job status: {status_str}"), ToOwned::to_owned);
        Ok(RunStatusDetail {
            status: run_status,
            pod_phase,
            message,
        })
    }

    async fn cancel_run(&self, run: &Run) -> Result<(), ExecutorError> {
        let executor_id = run
            .batch_executor_id
            .as_deref()
            .ok_or(ExecutorError::MissingExecutorId)?;
        self.client
            .terminate_job()
            .job_id(executor_id)
            .reason(CANCELLATION_REASON)
            .send()
            .await
            .map_err(|err| ExecutorError::Api(scrub_credentials(&err.to_string())))?;
        tracing::info!(executor_id, "terminated run");
        Ok(())
    }
}

// ============================================================================
// SECTION: Dummy Gateway
// ============================================================================

/// Batch gateway for the testing environment.
///
/// Submission assigns a deterministic executor id; describe always reports
/// the unavailability sentinel so readers keep the stored status.
#[derive(Debug, Default)]
pub struct DummyBatchGateway;

#[async_trait]
impl BatchExecutorGateway for DummyBatchGateway {
    async fn submit_run(&self, run: &mut Run) -> Result<(), ExecutorError> {
        let run_id = run.id.ok_or(ExecutorError::MissingExecutorId)?;
        run.batch_executor_id = Some(format!("dummy-executor-job-{}-run-{run_id}", run.job_id));
        Ok(())
    }

    async fn describe_run(&self, run: &Run) -> Result<RunStatusDetail, ExecutorError> {
        if run.batch_executor_id.is_none() {
            return Err(ExecutorError::MissingExecutorId);
        }
        Ok(RunStatusDetail {
            status: RunStatus::Error,
            pod_phase: PodPhase::Unknown,
            message: "AWS Batch API error: dummy executor reports no status".to_owned(),
        })
    }

    async fn cancel_run(&self, _run: &Run) -> Result<(), ExecutorError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
