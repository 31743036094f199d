// epx-cli/src/bootstrap.rs
// ============================================================================
// Module: EPX CLI Bootstrap
// Description: Controller wiring for CLI invocations.
// Purpose: Build the controller from the ambient environment per invocation.
// Dependencies: epx-config, epx-core, epx-gateways, epx-store
// ============================================================================

//! ## Overview
//! CLI invocations talk to the configured store and gateways directly, the
//! same wiring the server performs at startup. `ENVIRONMENT=TESTING` selects
//! the dummy gateways so commands can run without live backing services.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use epx_config::AppConfig;
use epx_config::DatabaseConfig;
use epx_core::BatchExecutorGateway;
use epx_core::JobController;
use epx_core::ResultsGateway;
use epx_core::UploadLocationGateway;
use epx_gateways::AwsBatchGateway;
use epx_gateways::DummyBatchGateway;
use epx_gateways::DummyResultsGateway;
use epx_gateways::DummyUploadGateway;
use epx_gateways::S3ResultsGateway;
use epx_gateways::S3UploadGateway;
use epx_store::DbTokenMinter;
use epx_store::ExecTokenMinter;

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Builds the controller from the ambient environment.
///
/// # Errors
///
/// Returns a rendered message when configuration or the store cannot be
/// resolved.
pub async fn build_controller() -> Result<Arc<JobController>, String> {
    let config = AppConfig::from_env().map_err(|err| format!("configuration error: {err}"))?;
    let database =
        DatabaseConfig::from_env().map_err(|err| format!("database configuration error: {err}"))?;
    let token_minter: Option<Arc<dyn DbTokenMinter>> = std::env::var("DATABASE_TOKEN_COMMAND")
        .ok()
        .map(|command| Arc::new(ExecTokenMinter::new(command)) as Arc<dyn DbTokenMinter>);
    let stores = epx_store::open_stores(&database, token_minter)
        .map_err(|err| format!("failed to open store: {err}"))?;

    let (uploads, results, batch): (
        Arc<dyn UploadLocationGateway>,
        Arc<dyn ResultsGateway>,
        Arc<dyn BatchExecutorGateway>,
    ) = if config.environment.is_testing() {
        (
            Arc::new(DummyUploadGateway::default()),
            Arc::new(DummyResultsGateway),
            Arc::new(DummyBatchGateway),
        )
    } else {
        let region = Some(config.aws_region.clone());
        (
            Arc::new(S3UploadGateway::connect(config.upload_bucket.clone(), region.clone()).await),
            Arc::new(S3ResultsGateway::connect(config.upload_bucket.clone(), region.clone()).await),
            Arc::new(
                AwsBatchGateway::connect(
                    config.batch.job_queue.clone(),
                    config.batch.job_definition.clone(),
                    region,
                )
                .await,
            ),
        )
    };

    Ok(Arc::new(JobController::new(
        stores.jobs,
        stores.runs,
        uploads,
        results,
        batch,
        config.upload_bucket,
    )))
}
