// epx-server/src/main.rs
// ============================================================================
// Module: EPX Server Entry Point
// Description: Process bootstrap for the control-plane HTTP service.
// Purpose: Resolve configuration, wire backends, and serve the API.
// Dependencies: epx-config, epx-core, epx-gateways, epx-store, axum, tokio
// ============================================================================

//! ## Overview
//! Startup order: tracing, configuration, repositories, gateways (real or
//! dummy per `ENVIRONMENT`), controller, listener. Configuration failures
//! abort before the listener binds; after that, all failures stay inside the
//! request cycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;
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
use epx_server::AppState;
use epx_server::build_router;
use epx_store::DbTokenMinter;
use epx_store::ExecTokenMinter;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Builds the gateway set for the configured environment.
async fn build_gateways(
    config: &AppConfig,
) -> (
    Arc<dyn UploadLocationGateway>,
    Arc<dyn ResultsGateway>,
    Arc<dyn BatchExecutorGateway>,
) {
    if config.environment.is_testing() {
        tracing::info!("testing environment: using dummy gateways");
        return (
            Arc::new(DummyUploadGateway::default()),
            Arc::new(DummyResultsGateway),
            Arc::new(DummyBatchGateway),
        );
    }
    let region = Some(config.aws_region.clone());
    let uploads = S3UploadGateway::connect(config.upload_bucket.clone(), region.clone()).await;
    let results = S3ResultsGateway::connect(config.upload_bucket.clone(), region.clone()).await;
    let batch = AwsBatchGateway::connect(
        config.batch.job_queue.clone(),
        config.batch.job_definition.clone(),
        region,
    )
    .await;
    (Arc::new(uploads), Arc::new(results), Arc::new(batch))
}

/// Runs the server; errors are rendered by `main`.
async fn run() -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|err| format!("configuration error: {err}"))?;
    let database = DatabaseConfig::from_env().map_err(|err| format!("database configuration error: {err}"))?;

    let token_minter: Option<Arc<dyn DbTokenMinter>> = std::env::var("DATABASE_TOKEN_COMMAND")
        .ok()
        .map(|command| Arc::new(ExecTokenMinter::new(command)) as Arc<dyn DbTokenMinter>);
    let stores = epx_store::open_stores(&database, token_minter)
        .map_err(|err| format!("failed to open store: {err}"))?;

    let (uploads, results, batch) = build_gateways(&config).await;
    let controller = Arc::new(JobController::new(
        stores.jobs,
        stores.runs,
        uploads,
        results,
        batch,
        config.upload_bucket.clone(),
    ));

    let router = build_router(AppState::new(controller));
    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|err| format!("failed to bind {address}: {err}"))?;
    tracing::info!(address, "control plane listening");
    axum::serve(listener, router)
        .await
        .map_err(|err| format!("server error: {err}"))
}

/// Process entry point.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}
