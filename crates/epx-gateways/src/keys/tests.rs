// epx-gateways/src/keys/tests.rs
// ============================================================================
// Module: Object Key Extraction Tests
// Description: Unit tests for URL-to-key recovery.
// Purpose: Validate every URL shape the platform persists.
// Dependencies: none beyond the parent module
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::extract_key_from_url;

const KEY: &str = "jobs/12/2025/10/23/211500/run_4_results.zip";

#[test]
fn s3_uris_resolve() {
    let url = format!("s3://uploads/{KEY}");
    assert_eq!(extract_key_from_url("uploads", &url).as_deref(), Some(KEY));
}

#[test]
fn virtual_hosted_urls_resolve() {
    let url = format!("https://uploads.s3.amazonaws.com/{KEY}");
    assert_eq!(extract_key_from_url("uploads", &url).as_deref(), Some(KEY));
}

#[test]
fn regional_virtual_hosted_urls_resolve() {
    let url = format!("https://uploads.s3.us-east-1.amazonaws.com/{KEY}");
    assert_eq!(extract_key_from_url("uploads", &url).as_deref(), Some(KEY));
}

#[test]
fn path_style_urls_resolve() {
    let url = format!("https://s3.amazonaws.com/uploads/{KEY}");
    assert_eq!(extract_key_from_url("uploads", &url).as_deref(), Some(KEY));
}

#[test]
fn presigned_queries_are_stripped() {
    let url = format!("https://uploads.s3.amazonaws.com/{KEY}?X-Amz-Signature=deadbeef&X-Amz-Expires=3600");
    assert_eq!(extract_key_from_url("uploads", &url).as_deref(), Some(KEY));
}

#[test]
fn raw_keys_pass_through() {
    assert_eq!(extract_key_from_url("uploads", KEY).as_deref(), Some(KEY));
}

#[test]
fn empty_input_yields_none() {
    assert_eq!(extract_key_from_url("uploads", ""), None);
    assert_eq!(extract_key_from_url("uploads", "https://uploads.s3.amazonaws.com/"), None);
}
