// epx-gateways/src/scrub.rs
// ============================================================================
// Module: EPX Credential Scrubber
// Description: Removes backing-service credentials from error messages.
// Purpose: Keep access keys, secrets, and signatures out of logs and errors.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Error payloads from the object store can embed access key ids, secrets,
//! and request signatures, in plain text, XML, or JSON. [`scrub_credentials`]
//! removes all of them before a message is logged or surfaced. The function
//! is idempotent: scrubbing a scrubbed message changes nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Replacement for access key ids.
const REDACTED_KEY: &str = "[REDACTED_KEY]";
/// Replacement for secrets and signatures.
const REDACTED: &str = "[REDACTED]";

/// `(pattern, replacement)` pairs applied in order.
static PATTERNS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    let specs: &[(&str, String)] = &[
        // Access key ids: AKIA followed by 16 uppercase alphanumerics.
        (r"AKIA[A-Z0-9]{16}", REDACTED_KEY.to_owned()),
        // Secrets and signatures: base64-like runs of 40 or more characters.
        (r"[A-Za-z0-9+/=]{40,}", REDACTED.to_owned()),
        // XML credential fields.
        (
            r"<AWSAccessKeyId>[^<]+</AWSAccessKeyId>",
            format!("<AWSAccessKeyId>{REDACTED_KEY}</AWSAccessKeyId>"),
        ),
        (
            r"<SecretAccessKey>[^<]+</SecretAccessKey>",
            format!("<SecretAccessKey>{REDACTED}</SecretAccessKey>"),
        ),
        (
            r"<Signature>[^<]+</Signature>",
            format!("<Signature>{REDACTED}</Signature>"),
        ),
        // JSON credential fields.
        (
            r#""AWSAccessKeyId":\s*"[^"]+""#,
            format!(r#""AWSAccessKeyId": "{REDACTED_KEY}""#),
        ),
        (
            r#""SecretAccessKey":\s*"[^"]+""#,
            format!(r#""SecretAccessKey": "{REDACTED}""#),
        ),
        (
            r#""Signature":\s*"[^"]+""#,
            format!(r#""Signature": "{REDACTED}""#),
        ),
    ];
    specs
        .iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|regex| (regex, replacement.clone()))
        })
        .collect()
});

// ============================================================================
// SECTION: Scrubbing
// ============================================================================

/// Removes credential material from an error message.
#[must_use]
pub fn scrub_credentials(message: &str) -> String {
    let mut scrubbed = message.to_owned();
    for (pattern, replacement) in PATTERNS.iter() {
        scrubbed = pattern.replace_all(&scrubbed, replacement.as_str()).into_owned();
    }
    scrubbed
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
