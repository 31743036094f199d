// epx-gateways/src/s3_results.rs
// ============================================================================
// Module: EPX Results Gateway
// Description: Server-side results storage and presigned downloads over S3.
// Purpose: Upload packaged results with ambient credentials and issue
//          time-limited download URLs.
// Dependencies: aws-sdk-s3, epx-core
// ============================================================================

//! ## Overview
//! Results archives are written server-side with the process's ambient
//! credentials (no presigned PUT), keyed under the job's [`KeyPrefix`], and
//! exposed as permanent unsigned HTTPS URLs; downloads get presigned GET
//! URLs on demand. Security posture: every error that may carry
//! backing-service detail passes the credential scrubber and is marked
//! sanitized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use epx_core::KeyPrefix;
use epx_core::ResultsGateway;
use epx_core::core::upload::UploadLocation;
use epx_core::interfaces::StorageError;

use crate::keys::extract_key_from_url;
use crate::scrub::scrub_credentials;

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Server-side results store over a single bucket.
pub struct S3ResultsGateway {
    /// S3 client handle.
    client: Client,
    /// Bucket results archives land in.
    bucket: String,
}

impl S3ResultsGateway {
    /// Connects the gateway using the ambient credential chain.
    pub async fn connect(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    /// Creates a gateway over an existing client, for alternate wiring.
    #[must_use]
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ResultsGateway for S3ResultsGateway {
    async fn upload_results(
        &self,
        job_id: i64,
        run_id: i64,
        zip_bytes: &[u8],
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        let key = prefix.run_results_key(run_id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(zip_bytes.to_vec()))
            .content_type("application/zip")
            .send()
            .await
            .map_err(|err| StorageError::Io {
                message: scrub_credentials(&format!("failed to upload results: {err}")),
                sanitized: true,
            })?;
        tracing::info!(
            job_id,
            run_id,
            key,
            byte_count = zip_bytes.len(),
            "uploaded results archive"
        );
        Ok(UploadLocation::new(format!(
            "https://{}.s3.amazonaws.com/{key}",
            self.bucket
        )))
    }

    async fn get_download_url(
        &self,
        results_url: &str,
        expiration_seconds: u64,
    ) -> Result<UploadLocation, StorageError> {
        let key = extract_key_from_url(&self.bucket, results_url).ok_or_else(|| {
            StorageError::Invalid(format!(
                "unrecognized results URL format: {}",
                UploadLocation::new(results_url).sanitized_url()
            ))
        })?;
        let presigning = PresigningConfig::builder()
            .expires_in(Duration::from_secs(expiration_seconds))
            .build()
            .map_err(|err| StorageError::Invalid(err.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|err| StorageError::Io {
                message: scrub_credentials(&format!("failed to generate download URL: {err}")),
                sanitized: true,
            })?;
        tracing::info!(key, expiration_seconds, "generated presigned download URL");
        Ok(UploadLocation::new(presigned.uri().to_owned()))
    }
}

// ============================================================================
// SECTION: Dummy Gateway
// ============================================================================

/// Results gateway for the testing environment.
///
/// Uploads are acknowledged without touching a store; download URLs append a
/// fake signature so sanitizer behavior stays observable.
#[derive(Debug, Default)]
pub struct DummyResultsGateway;

#[async_trait]
impl ResultsGateway for DummyResultsGateway {
    async fn upload_results(
        &self,
        job_id: i64,
        run_id: i64,
        zip_bytes: &[u8],
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        tracing::info!(job_id, run_id, byte_count = zip_bytes.len(), "dummy results upload");
        Ok(UploadLocation::new(format!(
            "https://dummy-results.s3.amazonaws.com/{}",
            prefix.run_results_key(run_id)
        )))
    }

    async fn get_download_url(
        &self,
        results_url: &str,
        expiration_seconds: u64,
    ) -> Result<UploadLocation, StorageError> {
        Ok(UploadLocation::new(format!(
            "{results_url}?X-Amz-Expires={expiration_seconds}"
        )))
    }
}
