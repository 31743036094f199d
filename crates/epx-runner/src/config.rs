// epx-runner/src/config.rs
// ============================================================================
// Module: EPX Runner Config
// Description: Environment-driven settings for one runner invocation.
// Purpose: Resolve job/run targeting, simulator paths, and the workspace.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The batch executor launches the runner with `JOB_ID` (and optionally
//! `RUN_ID`) in the environment; everything else has a deployment default.
//! `FRED_HOME` points at the simulator installation; the binary is looked up
//! under `FRED_HOME/bin/FRED` with `/usr/local/bin/FRED` as the container
//! fallback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runner configuration failures.
#[derive(Debug, Error)]
pub enum RunnerConfigError {
    /// A required variable is missing.
    #[error("missing required environment variable {0}")]
    MissingVariable(&'static str),
    /// A variable carries an unparseable value.
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        /// Variable name.
        variable: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Fallback simulator binary location inside containers.
const FALLBACK_FRED_BINARY: &str = "/usr/local/bin/FRED";

/// Settings for one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Job whose uploads drive this invocation.
    pub job_id: i64,
    /// Specific run to process (`None` processes every run config found).
    pub run_id: Option<i64>,
    /// Simulator installation root.
    pub fred_home: PathBuf,
    /// Directory downloads and outputs land in.
    pub workspace_dir: PathBuf,
    /// Control-plane CLI binary invoked for downloads and uploads.
    pub cli_binary: String,
}

impl RunnerConfig {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerConfigError`] when required variables are missing or
    /// malformed.
    pub fn from_env() -> Result<Self, RunnerConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an environment lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerConfigError`] when required variables are missing or
    /// malformed.
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, RunnerConfigError> {
        let job_id = env("JOB_ID")
            .ok_or(RunnerConfigError::MissingVariable("JOB_ID"))?
            .parse::<i64>()
            .map_err(|err| RunnerConfigError::InvalidValue {
                variable: "JOB_ID",
                reason: err.to_string(),
            })?;
        let run_id = env("RUN_ID")
            .map(|raw| {
                raw.parse::<i64>().map_err(|err| RunnerConfigError::InvalidValue {
                    variable: "RUN_ID",
                    reason: err.to_string(),
                })
            })
            .transpose()?;
        let fred_home = env("FRED_HOME")
            .map(PathBuf::from)
            .ok_or(RunnerConfigError::MissingVariable("FRED_HOME"))?;
        let workspace_dir = env("WORKSPACE_DIR")
            .map_or_else(|| PathBuf::from(format!("/workspace/job_{job_id}")), PathBuf::from);
        let cli_binary = env("EPX_CLI_BIN").unwrap_or_else(|| "epx-cli".to_owned());
        Ok(Self {
            job_id,
            run_id,
            fred_home,
            workspace_dir,
            cli_binary,
        })
    }

    /// Validates the resolved settings, returning every problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.fred_home.exists() {
            errors.push(format!("FRED_HOME does not exist: {}", self.fred_home.display()));
        }
        let bundled = self.fred_home.join("bin").join("FRED");
        if !bundled.exists() && !Path::new(FALLBACK_FRED_BINARY).exists() {
            errors.push(format!(
                "simulator binary not found at {} or {FALLBACK_FRED_BINARY}",
                bundled.display()
            ));
        }
        if self.job_id <= 0 {
            errors.push(format!("job_id must be positive, got: {}", self.job_id));
        }
        if let Some(run_id) = self.run_id
            && run_id <= 0
        {
            errors.push(format!("run_id must be positive, got: {run_id}"));
        }
        errors
    }

    /// Returns the simulator binary path.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerConfigError`] when no binary exists at either
    /// location.
    pub fn fred_binary(&self) -> Result<PathBuf, RunnerConfigError> {
        let bundled = self.fred_home.join("bin").join("FRED");
        if bundled.exists() {
            return Ok(bundled);
        }
        let fallback = PathBuf::from(FALLBACK_FRED_BINARY);
        if fallback.exists() {
            return Ok(fallback);
        }
        Err(RunnerConfigError::InvalidValue {
            variable: "FRED_HOME",
            reason: format!("simulator binary not found under {}", self.fred_home.display()),
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
