// epx-gateways/src/keys.rs
// ============================================================================
// Module: EPX Object Key Extraction
// Description: Object-key recovery from the URL shapes the platform emits.
// Purpose: Map any stored or presigned URL back to its object key.
// Dependencies: url
// ============================================================================

//! ## Overview
//! Locations are persisted as whatever URL shape produced them: `s3://`
//! URIs, virtual-hosted HTTPS URLs (with or without a region segment),
//! path-style HTTPS URLs, or presigned variants with a signature query.
//! [`extract_key_from_url`] strips the query and recovers the object key
//! from all of them; bare strings are treated as raw keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use url::Url;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Recovers the object key for `bucket` from a URL.
///
/// Returns `None` only for empty input or URLs with no path.
#[must_use]
pub fn extract_key_from_url(bucket: &str, raw_url: &str) -> Option<String> {
    if raw_url.is_empty() {
        return None;
    }
    let clean = raw_url.split('?').next().unwrap_or(raw_url);

    if let Some(rest) = clean.strip_prefix(&format!("s3://{bucket}/")) {
        return non_empty(rest);
    }
    if let Some((_, key)) = clean.split_once(&format!("{bucket}.s3.amazonaws.com/")) {
        return non_empty(key);
    }
    if let Some((_, key)) = clean.split_once(&format!("s3.amazonaws.com/{bucket}/")) {
        return non_empty(key);
    }
    // Regional virtual-hosted URLs: https://bucket.s3.{region}.amazonaws.com/key
    if clean.contains(&format!("{bucket}.s3."))
        && let Some((_, key)) = clean.split_once(".amazonaws.com/")
    {
        return non_empty(key);
    }
    if clean.starts_with("http://") || clean.starts_with("https://") {
        let parsed = Url::parse(clean).ok()?;
        let path = parsed.path().trim_start_matches('/');
        if parsed.host_str().is_some_and(|host| host.contains(bucket)) {
            return non_empty(path);
        }
        if let Some((first, rest)) = path.split_once('/')
            && first == bucket
        {
            return non_empty(rest);
        }
        return non_empty(path);
    }
    // Anything else is treated as a raw key.
    non_empty(clean)
}

/// Wraps a non-empty key, rejecting blanks.
fn non_empty(key: &str) -> Option<String> {
    if key.is_empty() {
        None
    } else {
        Some(key.to_owned())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
