// epx-runner/src/main.rs
// ============================================================================
// Module: EPX Runner Entry Point
// Description: Process bootstrap for one batch simulation task.
// Purpose: Resolve configuration and drive the pipeline to an exit code.
// Dependencies: epx-runner, tokio
// ============================================================================

//! ## Overview
//! The batch executor invokes this binary with `JOB_ID` (and optionally
//! `RUN_ID`) in the environment. A zero exit means every targeted run was
//! simulated and its results uploaded; any stage failure exits non-zero and
//! surfaces as a failed batch task.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;

use epx_runner::Pipeline;
use epx_runner::RunnerConfig;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Process entry point.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match RunnerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "runner configuration invalid");
            return ExitCode::FAILURE;
        }
    };
    match Pipeline::new(config).execute().await {
        Ok(workspace) => {
            tracing::info!(workspace = %workspace.display(), "runner finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "runner failed");
            ExitCode::FAILURE
        }
    }
}
