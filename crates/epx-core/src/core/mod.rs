// epx-core/src/core/mod.rs
// ============================================================================
// Module: EPX Core Domain
// Description: Domain entities and value objects for jobs, runs, and uploads.
// Purpose: Group the kernel's pure domain model under one namespace.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The domain module holds the entities (`Job`, `Run`), the value objects
//! (`KeyPrefix`, `UploadLocation`, `JobUpload`, `IdentityToken`), the pure
//! executor-status mapper, the upload content model, and results packaging.
//! Nothing in this module performs I/O beyond the packaging helpers, which
//! read the results tree they are asked to archive.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod content;
pub mod identity;
pub mod job;
pub mod key_prefix;
pub mod packaging;
pub mod run;
pub mod status_map;
pub mod timefmt;
pub mod upload;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use content::UploadContent;
pub use content::ZipFileEntry;
pub use identity::IdentityToken;
pub use identity::TokenError;
pub use job::Job;
pub use job::JobStatus;
pub use job::TransitionError;
pub use key_prefix::KeyPrefix;
pub use key_prefix::KeyPrefixError;
pub use packaging::PackagedResults;
pub use packaging::PackagingError;
pub use packaging::package_directory;
pub use run::PodPhase;
pub use run::Run;
pub use run::RunStatus;
pub use run::RunStatusDetail;
pub use status_map::map_executor_status;
pub use status_map::pod_phase_to_status;
pub use upload::JobUpload;
pub use upload::UploadContext;
pub use upload::UploadError;
pub use upload::UploadLocation;
pub use upload::UploadType;
