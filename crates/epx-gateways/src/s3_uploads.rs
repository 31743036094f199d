// epx-gateways/src/s3_uploads.rs
// ============================================================================
// Module: EPX Upload Location Gateway
// Description: Presigned-upload brokering and object inspection over S3.
// Purpose: Issue presigned PUT URLs, read objects back, filter by age, and
//          transition uploads to cold storage.
// Dependencies: aws-sdk-s3, epx-core, zip
// ============================================================================

//! ## Overview
//! [`S3UploadGateway`] is the real broker: keys derive from the job's
//! [`KeyPrefix`] so every artifact of a job shares one directory, presigned
//! PUT URLs carry signature and expiry as query parameters only (encryption
//! is a bucket default, so no encryption header is folded into the
//! signature and clients need no custom headers), and downloads are sniffed
//! into the typed content model. [`DummyUploadGateway`] returns a fixed URL
//! for the testing environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::MetadataDirective;
use aws_sdk_s3::types::StorageClass;
use epx_core::KeyPrefix;
use epx_core::UploadContent;
use epx_core::UploadLocationGateway;
use epx_core::ZipFileEntry;
use epx_core::core::upload::JobUpload;
use epx_core::core::upload::UploadLocation;
use epx_core::interfaces::StorageError;
use time::OffsetDateTime;
use zip::ZipArchive;

use crate::keys::extract_key_from_url;
use crate::scrub::scrub_credentials;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default presigned PUT validity.
const DEFAULT_EXPIRATION_SECONDS: u64 = 3_600;
/// Preview length for text-looking archive members.
const ZIP_PREVIEW_CHARS: usize = 500;
/// Hex preview length for undecodable binary objects.
const BINARY_PREVIEW_CHARS: usize = 200;
/// Member suffixes considered text-looking for previews.
const TEXT_SUFFIXES: [&str; 8] = [".txt", ".json", ".fred", ".xml", ".csv", ".log", ".py", ".sh"];

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a backing-store failure to a scrubbed storage error.
fn store_err(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Io {
        message: scrub_credentials(&format!("{context}: {err}")),
        sanitized: true,
    }
}

// ============================================================================
// SECTION: S3 Gateway
// ============================================================================

/// Presigned-upload broker over a single bucket.
pub struct S3UploadGateway {
    /// S3 client handle.
    client: Client,
    /// Bucket brokered uploads land in.
    bucket: String,
    /// Presigned PUT validity.
    expiration: Duration,
}

impl S3UploadGateway {
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
            expiration: Duration::from_secs(DEFAULT_EXPIRATION_SECONDS),
        }
    }

    /// Creates a gateway over an existing client, for alternate wiring.
    #[must_use]
    pub fn with_client(client: Client, bucket: impl Into<String>, expiration_seconds: u64) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            expiration: Duration::from_secs(expiration_seconds),
        }
    }

    /// Sniffs downloaded bytes into the typed content model.
    fn parse_content(bytes: Vec<u8>, key: &str) -> UploadContent {
        let looks_zip = bytes.starts_with(b"PK\x03\x04")
            || bytes.starts_with(b"PK\x05\x06")
            || key.ends_with(".zip")
            || key.contains("job_input");
        if looks_zip {
            match Self::parse_zip(&bytes) {
                Ok(content) => return content,
                Err(err) => {
                    tracing::warn!(key, error = %err, "failed to parse object as zip, treating as text");
                }
            }
        }
        match String::from_utf8(bytes) {
            Ok(text) => {
                let trimmed = text.trim();
                let looks_json = key.ends_with(".json")
                    || (trimmed.starts_with('{') && trimmed.ends_with('}'))
                    || (trimmed.starts_with('[') && trimmed.ends_with(']'));
                if looks_json {
                    UploadContent::Json { content: text }
                } else {
                    UploadContent::text(text)
                }
            }
            Err(err) => {
                let bytes = err.into_bytes();
                if bytes.contains(&0) {
                    let hex: String = bytes
                        .iter()
                        .flat_map(|byte| format!("{byte:02x}").into_bytes())
                        .map(char::from)
                        .take(BINARY_PREVIEW_CHARS)
                        .collect();
                    UploadContent::Binary {
                        preview: format!("[Binary content - hex representation]:\n{hex}..."),
                    }
                } else {
                    // Single-byte fallback decoding for legacy exports.
                    let text: String = bytes.iter().map(|byte| char::from(*byte)).collect();
                    UploadContent::text_with_encoding(text, "latin-1")
                }
            }
        }
    }

    /// Lists a zip payload with previews of text-looking members.
    fn parse_zip(bytes: &[u8]) -> Result<UploadContent, String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).map_err(|err| err.to_string())?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut summary_lines = vec![
            format!("[ZIP Archive Contents - {} files]", archive.len()),
            "=".repeat(60),
        ];
        for index in 0..archive.len() {
            let mut member = archive.by_index(index).map_err(|err| err.to_string())?;
            let name = member.name().to_owned();
            let preview = if TEXT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                let mut contents = String::new();
                match member.read_to_string(&mut contents) {
                    Ok(_) => {
                        let mut preview: String = contents.chars().take(ZIP_PREVIEW_CHARS).collect();
                        if contents.chars().count() > ZIP_PREVIEW_CHARS {
                            preview.push_str(&format!(
                                "\n... (truncated, {} total chars)",
                                contents.chars().count()
                            ));
                        }
                        Some(preview)
                    }
                    Err(err) => Some(format!("[Could not preview: {err}]")),
                }
            } else {
                None
            };
            summary_lines.push(format!("\n{name}"));
            summary_lines.push(format!("   Size: {} bytes", member.size()));
            summary_lines.push(format!("   Compressed: {} bytes", member.compressed_size()));
            if let Some(preview) = &preview {
                summary_lines.push("   Preview:".to_owned());
                summary_lines.push(format!("   {}", "-".repeat(40)));
                for line in preview.lines().take(10) {
                    summary_lines.push(format!("   {line}"));
                }
            }
            entries.push(ZipFileEntry {
                name,
                size: member.size(),
                compressed_size: member.compressed_size(),
                preview,
            });
        }
        Ok(UploadContent::ZipArchive {
            bytes: bytes.to_vec(),
            entries,
            summary: summary_lines.join("\n"),
        })
    }

    /// Recovers the object key for a location, as a storage error on failure.
    fn key_for(&self, location: &UploadLocation) -> Result<String, StorageError> {
        extract_key_from_url(&self.bucket, &location.url).ok_or_else(|| {
            StorageError::Invalid(format!(
                "could not extract object key from URL: {}",
                location.sanitized_url()
            ))
        })
    }
}

#[async_trait]
impl UploadLocationGateway for S3UploadGateway {
    async fn get_upload_location(
        &self,
        upload: &JobUpload,
        prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        let key = prefix
            .artifact_key(upload)
            .map_err(|err| StorageError::Invalid(err.to_string()))?;
        let presigning = PresigningConfig::builder()
            .expires_in(self.expiration)
            .build()
            .map_err(|err| StorageError::Invalid(err.to_string()))?;
        // Encryption is a bucket default; signing an encryption header here
        // would force every client PUT to repeat it.
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|err| store_err("failed to generate upload location", err))?;
        let location = UploadLocation::new(presigned.uri().to_owned());
        tracing::info!(
            job_id = upload.job_id,
            key,
            url = %location.sanitized_url(),
            "generated presigned upload URL"
        );
        Ok(location)
    }

    async fn read_content(&self, location: &UploadLocation) -> Result<UploadContent, StorageError> {
        let key = self.key_for(location)?;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| store_err("failed to read object", err))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|err| store_err("failed to read object body", err))?
            .into_bytes()
            .to_vec();
        tracing::info!(key, byte_count = bytes.len(), "read object content");
        Ok(Self::parse_content(bytes, &key))
    }

    async fn filter_by_age(
        &self,
        locations: Vec<UploadLocation>,
        threshold: OffsetDateTime,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        let mut filtered = Vec::new();
        for location in locations {
            let Ok(key) = self.key_for(&location) else {
                tracing::warn!(url = %location.sanitized_url(), "could not extract object key");
                continue;
            };
            match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
                Ok(head) => {
                    let Some(last_modified) = head.last_modified() else {
                        tracing::warn!(key, "object has no last-modified date");
                        continue;
                    };
                    if last_modified.secs() < threshold.unix_timestamp() {
                        filtered.push(location);
                    }
                }
                Err(err) => {
                    // Missing objects drop out of the candidate set.
                    tracing::warn!(key, error = %scrub_credentials(&err.to_string()), "object not reachable during age filter");
                }
            }
        }
        Ok(filtered)
    }

    async fn archive_uploads(
        &self,
        locations: Vec<UploadLocation>,
        age_threshold: Option<OffsetDateTime>,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let mut candidates = match age_threshold {
            Some(threshold) => self.filter_by_age(locations, threshold).await?,
            None => locations,
        };
        if candidates.is_empty() {
            tracing::info!("no uploads met the age threshold for archival");
            return Ok(Vec::new());
        }
        for location in &mut candidates {
            let key = match extract_key_from_url(&self.bucket, &location.url) {
                Some(key) => key,
                None => {
                    let message = format!(
                        "could not extract object key from URL: {}",
                        location.sanitized_url()
                    );
                    tracing::warn!("{message}");
                    location.errors.push(message);
                    continue;
                }
            };
            let copy_source = format!("{}/{key}", self.bucket);
            let outcome = self
                .client
                .copy_object()
                .bucket(&self.bucket)
                .key(&key)
                .copy_source(&copy_source)
                .storage_class(StorageClass::Glacier)
                .metadata_directive(MetadataDirective::Copy)
                .send()
                .await;
            match outcome {
                Ok(_) => tracing::info!(key, "archived object to cold storage"),
                Err(err) => {
                    let message =
                        scrub_credentials(&format!("failed to archive {key}: {err}"));
                    tracing::warn!("{message}");
                    location.errors.push(message);
                }
            }
        }
        Ok(candidates)
    }
}

// ============================================================================
// SECTION: Dummy Gateway
// ============================================================================

/// Fixed-URL gateway for the testing environment.
pub struct DummyUploadGateway {
    /// URL returned for every brokered upload.
    test_url: String,
}

impl DummyUploadGateway {
    /// Creates the dummy with its fixed URL.
    #[must_use]
    pub fn new(test_url: impl Into<String>) -> Self {
        Self {
            test_url: test_url.into(),
        }
    }
}

impl Default for DummyUploadGateway {
    fn default() -> Self {
        Self::new("http://localhost:5001/pre-signed-url")
    }
}

#[async_trait]
impl UploadLocationGateway for DummyUploadGateway {
    async fn get_upload_location(
        &self,
        upload: &JobUpload,
        _prefix: &KeyPrefix,
    ) -> Result<UploadLocation, StorageError> {
        tracing::info!(job_id = upload.job_id, "dummy upload location requested");
        Ok(UploadLocation::new(self.test_url.clone()))
    }

    async fn read_content(&self, location: &UploadLocation) -> Result<UploadContent, StorageError> {
        tracing::info!(url = %location.sanitized_url(), "dummy read content requested");
        Ok(UploadContent::text("This is dummy content for testing purposes."))
    }

    async fn filter_by_age(
        &self,
        locations: Vec<UploadLocation>,
        _threshold: OffsetDateTime,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        Ok(locations)
    }

    async fn archive_uploads(
        &self,
        locations: Vec<UploadLocation>,
        _age_threshold: Option<OffsetDateTime>,
    ) -> Result<Vec<UploadLocation>, StorageError> {
        tracing::info!(count = locations.len(), "dummy archive requested");
        Ok(locations)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
