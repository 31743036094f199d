// epx-config/src/app.rs
// ============================================================================
// Module: EPX Application Config
// Description: Service-level settings for the control plane.
// Purpose: Resolve bind address, bucket, region, environment, and batch wiring.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`AppConfig`] captures everything the server binary needs beyond the
//! database: the bind address, the upload bucket and region, which upload
//! gateway flavor to construct (`ENVIRONMENT=TESTING` selects the dummy), and
//! the batch executor queue/definition names used for dispatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration resolution failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is missing for the selected mode.
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
// SECTION: Environment
// ============================================================================

/// Deployment environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Real gateways against live backing services.
    #[default]
    Production,
    /// Real gateways with development defaults.
    Development,
    /// Dummy upload gateway, no object-store dependency.
    Testing,
}

impl Environment {
    /// Parses the `ENVIRONMENT` value, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "TESTING" => Self::Testing,
            "DEVELOPMENT" => Self::Development,
            _ => Self::Production,
        }
    }

    /// Returns true when dummy gateways should be constructed.
    #[must_use]
    pub const fn is_testing(self) -> bool {
        matches!(self, Self::Testing)
    }
}

// ============================================================================
// SECTION: Batch Config
// ============================================================================

/// Batch executor dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Queue jobs are submitted to.
    pub job_queue: String,
    /// Job definition runs execute under.
    pub job_definition: String,
}

// ============================================================================
// SECTION: App Config
// ============================================================================

/// Service-level configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Bind host for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
    /// Object-store bucket for brokered uploads and results.
    pub upload_bucket: String,
    /// Region the bucket and executor live in.
    pub aws_region: String,
    /// Batch executor wiring.
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when required variables are missing or
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an environment lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when required variables are missing or
    /// malformed.
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = env("ENVIRONMENT").map_or_else(Environment::default, |value| {
            Environment::parse(&value)
        });
        let host = env("EPX_HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = match env("EPX_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|err| ConfigError::InvalidValue {
                variable: "EPX_PORT",
                reason: err.to_string(),
            })?,
            None => 5000,
        };
        let upload_bucket = match env("S3_UPLOAD_BUCKET") {
            Some(bucket) => bucket,
            // The dummy gateway never touches a bucket.
            None if environment.is_testing() => String::new(),
            None => return Err(ConfigError::MissingVariable("S3_UPLOAD_BUCKET")),
        };
        let aws_region = env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_owned());
        let batch = BatchConfig {
            job_queue: env("BATCH_JOB_QUEUE").unwrap_or_else(|| "epx-simulation-queue".to_owned()),
            job_definition: env("BATCH_JOB_DEFINITION")
                .unwrap_or_else(|| "epx-simulation-runner".to_owned()),
        };
        Ok(Self {
            environment,
            host,
            port,
            upload_bucket,
            aws_region,
            batch,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
