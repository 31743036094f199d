// epx-cli/src/commands.rs
// ============================================================================
// Module: EPX CLI Commands
// Description: clap command tree for the operator CLI.
// Purpose: Define the argument surface for job, upload, and results tasks.
// Dependencies: clap
// ============================================================================

//! ## Overview
//! Command tree: `jobs list/info`, `jobs uploads list/archive/download`,
//! `jobs results upload`, and `version`. Argument names mirror the service's
//! parameter vocabulary (`--job-id`, `--days-since-create`) so operators can
//! move between the API and the CLI without translation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

// ============================================================================
// SECTION: Command Tree
// ============================================================================

/// EPX control-plane operator CLI.
#[derive(Debug, Parser)]
#[command(name = "epx-cli", about = "Operate EPX simulation jobs and uploads")]
pub struct Cli {
    /// Selected command.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Job management commands.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Print the CLI version.
    Version,
}

/// `jobs` subcommands.
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List jobs, newest first.
    List(ListArgs),
    /// Show one job and its runs.
    Info(InfoArgs),
    /// Upload management commands.
    #[command(subcommand)]
    Uploads(UploadsCommand),
    /// Results management commands.
    #[command(subcommand)]
    Results(ResultsCommand),
}

/// Arguments for `jobs list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Maximum number of jobs to display.
    #[arg(long)]
    pub limit: Option<u64>,
    /// Number of jobs to skip, for pagination.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
    /// Filter jobs by user id.
    #[arg(long)]
    pub user_id: Option<i64>,
    /// Output as JSON.
    #[arg(long)]
    pub json_output: bool,
}

/// Arguments for `jobs info`.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Job id to retrieve.
    #[arg(long)]
    pub job_id: i64,
    /// Output as JSON.
    #[arg(long)]
    pub json_output: bool,
}

/// `jobs uploads` subcommands.
#[derive(Debug, Subcommand)]
pub enum UploadsCommand {
    /// List upload metadata (and content summaries) for a job.
    List(UploadsListArgs),
    /// Archive a job's uploads to cold storage.
    Archive(UploadsArchiveArgs),
    /// Download a job's uploads to a local directory.
    Download(UploadsDownloadArgs),
}

/// Arguments for `jobs uploads list`.
#[derive(Debug, Args)]
pub struct UploadsListArgs {
    /// Job id to list uploads for.
    #[arg(long)]
    pub job_id: i64,
    /// Output as JSON.
    #[arg(long)]
    pub json_output: bool,
}

/// Arguments for `jobs uploads archive`.
#[derive(Debug, Args)]
pub struct UploadsArchiveArgs {
    /// Job id to archive uploads for.
    #[arg(long)]
    pub job_id: i64,
    /// Only archive uploads older than this many days.
    #[arg(long)]
    pub days_since_create: Option<i64>,
    /// Only archive uploads older than this many hours.
    #[arg(long)]
    pub hours_since_create: Option<i64>,
    /// Report what would be archived without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `jobs uploads download`.
#[derive(Debug, Args)]
pub struct UploadsDownloadArgs {
    /// Job id to download uploads for.
    #[arg(long)]
    pub job_id: i64,
    /// Directory to download files into (defaults to a temp directory).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Overwrite existing files.
    #[arg(short = 'f', long)]
    pub force: bool,
}

/// `jobs results` subcommands.
#[derive(Debug, Subcommand)]
pub enum ResultsCommand {
    /// Package a results directory and upload it for a run.
    Upload(ResultsUploadArgs),
}

/// Arguments for `jobs results upload`.
#[derive(Debug, Args)]
pub struct ResultsUploadArgs {
    /// Job the run belongs to.
    #[arg(long)]
    pub job_id: i64,
    /// Run to attach the results to.
    #[arg(long)]
    pub run_id: i64,
    /// Directory containing simulator output (RUN* layout).
    #[arg(long)]
    pub results_dir: PathBuf,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
