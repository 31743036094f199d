// epx-gateways/src/lib.rs
// ============================================================================
// Module: EPX Gateways Library
// Description: Object-store and batch-executor gateway implementations.
// Purpose: Bind the kernel's gateway interfaces to live backing services.
// Dependencies: crate::{batch, keys, s3_results, s3_uploads, scrub}
// ============================================================================

//! ## Overview
//! This crate ships the concrete gateways the control plane runs with: the
//! presigned-upload broker and content reader, the server-side results store,
//! and the batch executor client, plus dummy flavors for the testing
//! environment. Security posture: every error message that may carry
//! backing-service detail passes the credential scrubber before leaving this
//! crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod batch;
pub mod keys;
pub mod s3_results;
pub mod s3_uploads;
pub mod scrub;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batch::AwsBatchGateway;
pub use batch::DummyBatchGateway;
pub use keys::extract_key_from_url;
pub use s3_results::DummyResultsGateway;
pub use s3_results::S3ResultsGateway;
pub use s3_uploads::DummyUploadGateway;
pub use s3_uploads::S3UploadGateway;
pub use scrub::scrub_credentials;
