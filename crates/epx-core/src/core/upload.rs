// epx-core/src/core/upload.rs
// ============================================================================
// Module: EPX Upload Metadata
// Description: Upload descriptors and presigned-URL location value objects.
// Purpose: Constrain context/type pairs and keep URL sanitization in one place.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`JobUpload`] describes one artifact associated with a job or run without
//! carrying its content. The context/type pair is constrained at construction
//! (`job` uploads are config/input, `run` uploads are
//! config/output/results/logs, and run uploads require a run id).
//! [`UploadLocation`] wraps a URL plus accumulated per-object errors;
//! equality is by URL, and the sanitizer strips query strings (which carry
//! signatures) and masks `s3://` bucket names before anything is logged or
//! shown to users.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upload descriptor validation failures.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Job id was zero or negative.
    #[error("job id must be positive")]
    NonPositiveJobId,
    /// Run id was zero or negative.
    #[error("run id must be positive when provided")]
    NonPositiveRunId,
    /// Run-context upload without a run id.
    #[error("run uploads require a run id")]
    MissingRunId,
    /// Context/type pair outside the constraint table.
    #[error("{context} context does not support {upload_type:?} uploads")]
    UnsupportedPair {
        /// Context of the rejected descriptor.
        context: UploadContext,
        /// Type of the rejected descriptor.
        upload_type: UploadType,
    },
    /// Unknown context string at a boundary.
    #[error("invalid context {0:?}, must be one of [\"job\", \"run\"]")]
    UnknownContext(String),
    /// Unknown upload type string at a boundary.
    #[error("invalid type {0:?}, must be one of [\"config\", \"input\", \"output\", \"results\", \"logs\"]")]
    UnknownType(String),
}

// ============================================================================
// SECTION: Context and Type
// ============================================================================

/// Whether an upload belongs to the job or to one of its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadContext {
    /// Job-level artifact.
    Job,
    /// Run-level artifact.
    Run,
}

impl UploadContext {
    /// Returns the wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Run => "run",
        }
    }

    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::UnknownContext`] for anything else.
    pub fn parse(value: &str) -> Result<Self, UploadError> {
        match value {
            "job" => Ok(Self::Job),
            "run" => Ok(Self::Run),
            other => Err(UploadError::UnknownContext(other.to_owned())),
        }
    }
}

impl std::fmt::Display for UploadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for UploadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of artifact being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadType {
    /// Configuration JSON.
    Config,
    /// Input archive.
    Input,
    /// Raw simulator output.
    Output,
    /// Packaged results archive.
    Results,
    /// Log file.
    Logs,
}

impl UploadType {
    /// Returns the wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Input => "input",
            Self::Output => "output",
            Self::Results => "results",
            Self::Logs => "logs",
        }
    }

    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::UnknownType`] for anything else.
    pub fn parse(value: &str) -> Result<Self, UploadError> {
        match value {
            "config" => Ok(Self::Config),
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "results" => Ok(Self::Results),
            "logs" => Ok(Self::Logs),
            other => Err(UploadError::UnknownType(other.to_owned())),
        }
    }

    /// Returns the filename extension conventionally used for this type.
    #[must_use]
    const fn extension(self) -> &'static str {
        match self {
            Self::Config => ".json",
            Self::Input => ".zip",
            Self::Output | Self::Results => ".csv",
            Self::Logs => ".log",
        }
    }
}

// ============================================================================
// SECTION: Upload Location
// ============================================================================

/// A storage location for one uploaded object.
///
/// Equality is by URL only; `errors` accumulates per-object failures during
/// batch operations such as archival.
#[derive(Debug, Clone)]
pub struct UploadLocation {
    /// Presigned or permanent URL of the object.
    pub url: String,
    /// Errors recorded against this location by batch operations.
    pub errors: Vec<String>,
}

impl UploadLocation {
    /// Creates a location with no recorded errors.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            errors: Vec::new(),
        }
    }

    /// Returns the URL with sensitive parts removed.
    ///
    /// Query strings carry presigned signatures and are stripped; `s3://`
    /// bucket names are partially masked.
    #[must_use]
    pub fn sanitized_url(&self) -> String {
        if self.url.is_empty() {
            return String::new();
        }
        if let Some(rest) = self.url.strip_prefix("s3://") {
            let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
            let masked = if bucket.len() > 4 {
                format!("{}***{}", &bucket[..2], &bucket[bucket.len() - 2..])
            } else {
                bucket.to_owned()
            };
            return format!("s3://{masked}/{path}");
        }
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            return self.url.split('?').next().unwrap_or(&self.url).to_owned();
        }
        self.url.clone()
    }

    /// Extracts the trailing filename from the URL, when one is present.
    #[must_use]
    pub fn extract_filename(&self) -> Option<String> {
        if self.url.is_empty() {
            return None;
        }
        let without_query = self.url.split('?').next().unwrap_or(&self.url);
        let candidate = without_query.rsplit('/').next()?;
        if candidate.is_empty() || !candidate.contains('.') {
            return None;
        }
        Some(candidate.to_owned())
    }

    /// Serializes the location for API responses.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({ "url": self.url })
    }

    /// Serializes the location with the sanitized URL.
    #[must_use]
    pub fn to_sanitized_dict(&self) -> Value {
        serde_json::json!({ "url": self.sanitized_url() })
    }
}

impl PartialEq for UploadLocation {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for UploadLocation {}

impl std::hash::Hash for UploadLocation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

// ============================================================================
// SECTION: Job Upload
// ============================================================================

/// Metadata describing one upload associated with a job or run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpload {
    /// Upload context.
    pub context: UploadContext,
    /// Upload type.
    pub upload_type: UploadType,
    /// Parent job identifier.
    pub job_id: i64,
    /// Run identifier; required iff `context` is `run`.
    pub run_id: Option<i64>,
    /// Storage location, once brokered or discovered.
    pub location: Option<UploadLocation>,
}

impl JobUpload {
    /// Creates a validated upload descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when ids are non-positive, the context/type
    /// pair is unsupported, or a run upload lacks a run id.
    pub fn new(
        context: UploadContext,
        upload_type: UploadType,
        job_id: i64,
        run_id: Option<i64>,
    ) -> Result<Self, UploadError> {
        if job_id <= 0 {
            return Err(UploadError::NonPositiveJobId);
        }
        if let Some(run_id) = run_id
            && run_id <= 0
        {
            return Err(UploadError::NonPositiveRunId);
        }
        let supported = match context {
            UploadContext::Job => matches!(upload_type, UploadType::Config | UploadType::Input),
            UploadContext::Run => matches!(
                upload_type,
                UploadType::Config | UploadType::Output | UploadType::Results | UploadType::Logs
            ),
        };
        if !supported {
            return Err(UploadError::UnsupportedPair {
                context,
                upload_type,
            });
        }
        if context == UploadContext::Run && run_id.is_none() {
            return Err(UploadError::MissingRunId);
        }
        Ok(Self {
            context,
            upload_type,
            job_id,
            run_id,
            location: None,
        })
    }

    /// Attaches a discovered storage location.
    #[must_use]
    pub fn with_location(mut self, location: UploadLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Returns a default filename for materializing this upload locally.
    #[must_use]
    pub fn default_filename(&self) -> String {
        let extension = self.upload_type.extension();
        match (self.context, self.run_id) {
            (UploadContext::Run, Some(run_id)) => {
                format!("run_{run_id}_{}{extension}", self.upload_type.as_str())
            }
            (UploadContext::Job, _) => {
                format!("job_{}_{}{extension}", self.job_id, self.upload_type.as_str())
            }
            (UploadContext::Run, None) => {
                format!("{}_{}{extension}", self.context.as_str(), self.upload_type.as_str())
            }
        }
    }

    /// Serializes the upload with its sanitized location.
    #[must_use]
    pub fn to_sanitized_dict(&self) -> Value {
        let mut dict = serde_json::json!({
            "context": self.context.as_str(),
            "uploadType": self.upload_type.as_str(),
            "jobId": self.job_id,
            "runId": self.run_id,
        });
        if let (Some(location), Some(map)) = (&self.location, dict.as_object_mut()) {
            map.insert("location".to_owned(), location.to_sanitized_dict());
        }
        dict
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
