// epx-runner/src/pipeline.rs
// ============================================================================
// Module: EPX Runner Pipeline
// Description: Stage orchestration for one simulation task.
// Purpose: Download, extract, prepare, validate, execute, and upload.
// Dependencies: crate::{config, fred_file}, tokio, zip
// ============================================================================

//! ## Overview
//! The pipeline is a single linear sequence; each stage validates its own
//! preconditions and any failure aborts everything downstream. Subprocesses
//! (the control-plane CLI and the simulator) run under explicit timeouts and
//! have stdout/stderr captured into per-run log files next to the outputs
//! they describe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::process::Output;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

use crate::config::RunnerConfig;
use crate::fred_file::FredFileBuilder;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout for download and upload through the control-plane CLI.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);
/// Timeout for simulator validation runs.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for full simulator executions.
const SIMULATION_TIMEOUT: Duration = Duration::from_secs(3_600);

/// Run config filename pattern (`run_{id}_config.json`).
static RUN_CONFIG_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^run_(\d+)_config\.json$").ok());

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline stage failures.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Download of brokered uploads failed.
    #[error("download failed: {0}")]
    Download(String),
    /// Input archive extraction failed.
    #[error("extraction failed: {0}")]
    Extraction(String),
    /// Input preparation failed.
    #[error("input preparation failed: {0}")]
    Config(String),
    /// Simulator validation rejected a prepared input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Simulator execution failed.
    #[error("simulation failed: {0}")]
    Simulation(String),
    /// Results upload failed.
    #[error("results upload failed: {0}")]
    Upload(String),
    /// Pre-flight configuration problems.
    #[error("configuration invalid: {0}")]
    Configuration(String),
}

// ============================================================================
// SECTION: Prepared Runs
// ============================================================================

/// One run after preparation, flowing through the remaining stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    /// Run identifier.
    pub run_id: i64,
    /// Prepared simulator input path.
    pub input_path: PathBuf,
    /// 16-bit run number derived from the seed.
    pub run_number: i64,
}

// ============================================================================
// SECTION: Subprocess Helpers
// ============================================================================

/// Runs a command under a timeout, capturing output.
async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
    what: &str,
) -> Result<Output, String> {
    let child = command
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(format!("{what} failed to start: {err}")),
        Err(_) => Err(format!("{what} timed out after {}s", timeout.as_secs())),
    }
}

/// Writes captured output to a log file, stderr under a marker.
fn write_log(path: &Path, output: &Output, failed: bool) -> Result<(), String> {
    let mut contents = String::new();
    if failed {
        contents.push_str("STAGE FAILED\n\n");
    }
    contents.push_str(&String::from_utf8_lossy(&output.stdout));
    if !output.stderr.is_empty() {
        contents.push_str("\n\n=== STDERR ===\n");
        contents.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    std::fs::write(path, contents).map_err(|err| format!("failed to write {}: {err}", path.display()))
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Orchestrates the simulation pipeline for one batch task.
pub struct Pipeline {
    /// Resolved runner configuration.
    config: RunnerConfig,
}

impl Pipeline {
    /// Creates a pipeline over a resolved configuration.
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Downloads the job's uploads into the workspace through the CLI.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Download`] when the CLI fails, times out, or
    /// produces no files.
    pub async fn download_uploads(&self) -> Result<(), RunnerError> {
        std::fs::create_dir_all(&self.config.workspace_dir)
            .map_err(|err| RunnerError::Download(format!("failed to create workspace: {err}")))?;
        let mut command = Command::new(&self.config.cli_binary);
        command
            .arg("jobs")
            .arg("uploads")
            .arg("download")
            .arg("--job-id")
            .arg(self.config.job_id.to_string())
            .arg("--output-dir")
            .arg(&self.config.workspace_dir)
            .arg("-f");
        let output = run_with_timeout(command, TRANSFER_TIMEOUT, "upload download")
            .await
            .map_err(RunnerError::Download)?;
        if !output.status.success() {
            return Err(RunnerError::Download(format!(
                "cli exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let downloaded = std::fs::read_dir(&self.config.workspace_dir)
            .map_err(|err| RunnerError::Download(err.to_string()))?
            .count();
        if downloaded == 0 {
            return Err(RunnerError::Download(format!(
                "no files downloaded for job {}",
                self.config.job_id
            )));
        }
        tracing::info!(job_id = self.config.job_id, file_count = downloaded, "downloaded uploads");
        Ok(())
    }

    /// Extracts `job_input.zip` into the workspace when present.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Extraction`] on archive failures.
    pub fn extract_archives(&self) -> Result<(), RunnerError> {
        let archive_path = self.config.workspace_dir.join("job_input.zip");
        if !archive_path.exists() {
            tracing::info!(job_id = self.config.job_id, "no job_input.zip to extract");
            return Ok(());
        }
        let file = std::fs::File::open(&archive_path)
            .map_err(|err| RunnerError::Extraction(format!("failed to open archive: {err}")))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|err| RunnerError::Extraction(format!("invalid zip file: {err}")))?;
        archive
            .extract(&self.config.workspace_dir)
            .map_err(|err| RunnerError::Extraction(format!("failed to extract archive: {err}")))?;
        tracing::info!(job_id = self.config.job_id, "extracted job input archive");
        Ok(())
    }

    /// Locates the run configs to process for this invocation.
    fn find_run_configs(&self) -> Result<Vec<(i64, PathBuf)>, RunnerError> {
        if let Some(run_id) = self.config.run_id {
            let path = self
                .config
                .workspace_dir
                .join(format!("run_{run_id}_config.json"));
            if !path.exists() {
                return Err(RunnerError::Config(format!("run config not found: {}", path.display())));
            }
            return Ok(vec![(run_id, path)]);
        }
        let Some(pattern) = RUN_CONFIG_PATTERN.as_ref() else {
            return Err(RunnerError::Config("run config pattern unavailable".to_owned()));
        };
        let mut configs = Vec::new();
        let entries = std::fs::read_dir(&self.config.workspace_dir)
            .map_err(|err| RunnerError::Config(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| RunnerError::Config(err.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(captures) = pattern.captures(name)
                && let Some(run_id) = captures.get(1).and_then(|id| id.as_str().parse::<i64>().ok())
            {
                configs.push((run_id, entry.path()));
            }
        }
        configs.sort();
        if configs.is_empty() {
            return Err(RunnerError::Config(format!(
                "no run config files found in {}",
                self.config.workspace_dir.display()
            )));
        }
        Ok(configs)
    }

    /// Prepares a simulator input for each targeted run.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] when configs or `main.fred` are
    /// missing or malformed.
    pub fn prepare_inputs(&self) -> Result<Vec<PreparedRun>, RunnerError> {
        let main_fred = self.config.workspace_dir.join("main.fred");
        if !main_fred.exists() {
            return Err(RunnerError::Config(format!(
                "main.fred not found in {}",
                self.config.workspace_dir.display()
            )));
        }
        let run_configs = self.find_run_configs()?;
        let mut prepared = Vec::with_capacity(run_configs.len());
        for (run_id, config_path) in run_configs {
            let builder = FredFileBuilder::from_run_config(&config_path, &main_fred)
                .map_err(|err| RunnerError::Config(format!("run {run_id}: {err}")))?;
            let input_path = self
                .config
                .workspace_dir
                .join(format!("run_{run_id}_prepared.fred"));
            builder
                .build(&input_path)
                .map_err(|err| RunnerError::Config(format!("run {run_id}: {err}")))?;
            prepared.push(PreparedRun {
                run_id,
                input_path,
                run_number: builder.run_number(),
            });
            tracing::info!(run_id, "prepared simulator input");
        }
        Ok(prepared)
    }

    /// Validates each prepared input with the simulator's check-only flag.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Validation`] on the first rejected input.
    pub async fn validate_inputs(&self, prepared: &[PreparedRun]) -> Result<(), RunnerError> {
        let fred_binary = self
            .config
            .fred_binary()
            .map_err(|err| RunnerError::Configuration(err.to_string()))?;
        for run in prepared {
            let log_path = self
                .config
                .workspace_dir
                .join(format!("run_{}_validation.log", run.run_id));
            let mut command = Command::new(&fred_binary);
            command
                .arg("-p")
                .arg(&run.input_path)
                .arg("-c")
                .env("FRED_HOME", &self.config.fred_home);
            let output = run_with_timeout(command, VALIDATION_TIMEOUT, "validation")
                .await
                .map_err(RunnerError::Validation)?;
            let failed = !output.status.success();
            write_log(&log_path, &output, failed).map_err(RunnerError::Validation)?;
            if failed {
                return Err(RunnerError::Validation(format!(
                    "simulator rejected input for run {}; see {}",
                    run.run_id,
                    log_path.display()
                )));
            }
            tracing::info!(run_id = run.run_id, log = %log_path.display(), "validation passed");
        }
        Ok(())
    }

    /// Executes the simulator for each validated run.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Simulation`] on the first failed execution.
    pub async fn run_simulations(&self, prepared: &[PreparedRun]) -> Result<(), RunnerError> {
        let fred_binary = self
            .config
            .fred_binary()
            .map_err(|err| RunnerError::Configuration(err.to_string()))?;
        for run in prepared {
            let output_dir = self
                .config
                .workspace_dir
                .join("OUT")
                .join(format!("run_{}", run.run_id));
            std::fs::create_dir_all(&output_dir)
                .map_err(|err| RunnerError::Simulation(format!("failed to create output dir: {err}")))?;
            let log_path = self
                .config
                .workspace_dir
                .join(format!("run_{}_simulation.log", run.run_id));

            let mut command = Command::new(&fred_binary);
            command
                .arg("-p")
                .arg(&run.input_path)
                .arg("-r")
                .arg(run.run_number.to_string())
                .arg("-d")
                .arg(&output_dir)
                .env("FRED_HOME", &self.config.fred_home);
            tracing::info!(run_id = run.run_id, run_number = run.run_number, "starting simulation");
            let output = run_with_timeout(command, SIMULATION_TIMEOUT, "simulation")
                .await
                .map_err(RunnerError::Simulation)?;
            let failed = !output.status.success();
            write_log(&log_path, &output, failed).map_err(RunnerError::Simulation)?;
            if failed {
                return Err(RunnerError::Simulation(format!(
                    "simulator failed for run {}; see {}",
                    run.run_id,
                    log_path.display()
                )));
            }
            tracing::info!(run_id = run.run_id, output_dir = %output_dir.display(), "simulation completed");
        }
        Ok(())
    }

    /// Uploads each run's results through the control-plane CLI.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Upload`] on the first failed upload.
    pub async fn upload_results(&self, prepared: &[PreparedRun]) -> Result<(), RunnerError> {
        for run in prepared {
            let results_dir = self
                .config
                .workspace_dir
                .join("OUT")
                .join(format!("run_{}", run.run_id));
            let mut command = Command::new(&self.config.cli_binary);
            command
                .arg("jobs")
                .arg("results")
                .arg("upload")
                .arg("--job-id")
                .arg(self.config.job_id.to_string())
                .arg("--run-id")
                .arg(run.run_id.to_string())
                .arg("--results-dir")
                .arg(&results_dir);
            let output = run_with_timeout(command, TRANSFER_TIMEOUT, "results upload")
                .await
                .map_err(RunnerError::Upload)?;
            if !output.status.success() {
                return Err(RunnerError::Upload(format!(
                    "cli exited with {} for run {}: {}",
                    output.status,
                    run.run_id,
                    String::from_utf8_lossy(&output.stderr)
                )));
            }
            tracing::info!(run_id = run.run_id, "uploaded results");
        }
        Ok(())
    }

    /// Executes the complete pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; downstream stages never run after a
    /// failure.
    pub async fn execute(&self) -> Result<PathBuf, RunnerError> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            return Err(RunnerError::Configuration(problems.join("; ")));
        }
        tracing::info!(
            job_id = self.config.job_id,
            run_id = self.config.run_id,
            workspace = %self.config.workspace_dir.display(),
            "starting pipeline"
        );
        self.download_uploads().await?;
        self.extract_archives()?;
        let prepared = self.prepare_inputs()?;
        self.validate_inputs(&prepared).await?;
        self.run_simulations(&prepared).await?;
        self.upload_results(&prepared).await?;
        tracing::info!(
            job_id = self.config.job_id,
            completed_runs = prepared.len(),
            "pipeline completed"
        );
        Ok(self.config.workspace_dir.clone())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
