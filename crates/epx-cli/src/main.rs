// epx-cli/src/main.rs
// ============================================================================
// Module: EPX CLI Entry Point
// Description: Command dispatcher for the operator CLI.
// Purpose: Parse arguments, run one controller operation, map to exit codes.
// Dependencies: clap, epx-cli, tokio
// ============================================================================

//! ## Overview
//! Exit code 0 on success, 1 on any failure. Output goes to stdout as text
//! tables or JSON; diagnostics go through tracing on stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use epx_cli::Cli;
use epx_cli::Command;
use epx_cli::JobsCommand;
use epx_cli::ResultsCommand;
use epx_cli::UploadsCommand;
use epx_cli::build_controller;
use epx_cli::output;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes one rendered block to stdout.
fn emit(text: &str) -> Result<(), String> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").map_err(|err| format!("failed to write output: {err}"))
}

/// Serializes a value as pretty JSON.
fn to_json(value: &serde_json::Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("failed to serialize output: {err}"))
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Runs the selected command, returning the rendered failure on error.
async fn dispatch(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Version => emit(&format!("epx-cli {}", env!("CARGO_PKG_VERSION"))),
        Command::Jobs(jobs_command) => {
            let controller = build_controller().await?;
            match jobs_command {
                JobsCommand::List(args) => {
                    let jobs = controller
                        .list_jobs(args.limit, args.offset, args.user_id)
                        .map_err(|err| err.to_string())?;
                    if args.json_output {
                        emit(&to_json(&serde_json::Value::Array(jobs))?)
                    } else {
                        emit(&output::format_jobs_list(&jobs))
                    }
                }
                JobsCommand::Info(args) => {
                    let job = controller.get_job(args.job_id).map_err(|err| err.to_string())?;
                    let runs = controller.get_runs(args.job_id).await.map_err(|err| err.to_string())?;
                    if args.json_output {
                        emit(&to_json(&serde_json::json!({ "job": job, "runs": runs }))?)
                    } else {
                        emit(&output::format_job_info(&job, &runs))
                    }
                }
                JobsCommand::Uploads(UploadsCommand::List(args)) => {
                    let uploads = controller
                        .get_job_uploads(args.job_id, true)
                        .await
                        .map_err(|err| err.to_string())?;
                    if args.json_output {
                        emit(&to_json(&serde_json::Value::Array(uploads))?)
                    } else {
                        emit(&output::format_uploads(&uploads))
                    }
                }
                JobsCommand::Uploads(UploadsCommand::Archive(args)) => {
                    let archived = controller
                        .archive_job_uploads(
                            args.job_id,
                            args.days_since_create,
                            args.hours_since_create,
                            args.dry_run,
                        )
                        .await
                        .map_err(|err| err.to_string())?;
                    let verb = if args.dry_run { "Would archive" } else { "Archived" };
                    emit(&format!("{verb} {} upload(s)", archived.len()))?;
                    emit(&to_json(&serde_json::Value::Array(archived))?)
                }
                JobsCommand::Uploads(UploadsCommand::Download(args)) => {
                    let target = match args.output_dir {
                        Some(dir) => dir,
                        None => std::env::temp_dir().join(format!("epx_job_{}", args.job_id)),
                    };
                    let path = controller
                        .download_job_uploads(args.job_id, &target, args.force)
                        .await
                        .map_err(|err| err.to_string())?;
                    emit(&format!("Downloaded uploads to {path}"))
                }
                JobsCommand::Results(ResultsCommand::Upload(args)) => {
                    let url = controller
                        .upload_results_from_directory(args.job_id, args.run_id, &args.results_dir)
                        .await
                        .map_err(|err| err.to_string())?;
                    emit(&format!("Uploaded results for run {}: {url}", args.run_id))
                }
            }
        }
    }
}

/// Process entry point.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}
