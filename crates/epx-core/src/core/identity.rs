// epx-core/src/core/identity.rs
// ============================================================================
// Module: EPX Identity Token
// Description: Bearer token parsing for caller identity.
// Purpose: Decode the opaque offline token into user id and scopes hash.
// Dependencies: base64, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Callers present an `Offline-Token` header of the form
//! `Bearer base64(json({user_id, scopes_hash}))`. The decoder rejects a
//! missing `Bearer` prefix, malformed base64, and missing fields; the raw
//! token is retained for downstream forwarding. The token is opaque identity
//! only, not an authorization decision. Security posture: tokens arrive from
//! untrusted callers and are validated field by field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity token decoding failures.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token was empty.
    #[error("bearer token cannot be empty")]
    Empty,
    /// Token did not carry the `Bearer ` prefix.
    #[error("invalid bearer token format, expected 'Bearer <token>'")]
    MissingPrefix,
    /// Base64 payload could not be decoded.
    #[error("failed to decode base64 token: {0}")]
    Base64(String),
    /// Decoded payload was not the expected JSON shape.
    #[error("failed to parse token payload: {0}")]
    Payload(String),
    /// Payload carried a non-positive user id.
    #[error("token user_id must be positive")]
    NonPositiveUserId,
}

// ============================================================================
// SECTION: Token
// ============================================================================

/// Decoded token payload shape.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    /// Caller's user identifier.
    user_id: i64,
    /// Opaque hash of the caller's registered scopes.
    scopes_hash: String,
}

/// Caller identity decoded from an offline bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    /// Caller's user identifier.
    pub user_id: i64,
    /// Opaque hash of the caller's registered scopes.
    pub scopes_hash: String,
    /// The full raw token as presented, including the `Bearer ` prefix.
    pub raw: String,
}

impl IdentityToken {
    /// Decodes a bearer token string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the prefix, encoding, or payload is
    /// invalid.
    pub fn from_bearer(bearer_token: &str) -> Result<Self, TokenError> {
        if bearer_token.is_empty() {
            return Err(TokenError::Empty);
        }
        let encoded = bearer_token
            .strip_prefix("Bearer ")
            .ok_or(TokenError::MissingPrefix)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|err| TokenError::Base64(err.to_string()))?;
        let payload: TokenPayload =
            serde_json::from_slice(&decoded).map_err(|err| TokenError::Payload(err.to_string()))?;
        if payload.user_id <= 0 {
            return Err(TokenError::NonPositiveUserId);
        }
        Ok(Self {
            user_id: payload.user_id,
            scopes_hash: payload.scopes_hash,
            raw: bearer_token.to_owned(),
        })
    }

    /// Encodes a bearer token for a user id.
    ///
    /// Convenience for tests and CLI integration; the scopes hash defaults to
    /// a placeholder when not supplied.
    #[must_use]
    pub fn generate_bearer(user_id: i64, scopes_hash: Option<&str>) -> String {
        let payload = serde_json::json!({
            "user_id": user_id,
            "scopes_hash": scopes_hash.unwrap_or("default_scopes_hash"),
        });
        format!("Bearer {}", STANDARD.encode(payload.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
