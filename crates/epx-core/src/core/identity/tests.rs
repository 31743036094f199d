// epx-core/src/core/identity/tests.rs
// ============================================================================
// Module: Identity Token Tests
// Description: Unit tests for bearer token decoding.
// Purpose: Validate prefix, base64, payload, and round-trip behavior.
// Dependencies: base64
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use super::IdentityToken;
use super::TokenError;

/// Token used throughout the client contract fixtures: user 123, hash abc123.
const CONTRACT_TOKEN: &str = "Bearer eyJ1c2VyX2lkIjogMTIzLCAic2NvcGVzX2hhc2giOiAiYWJjMTIzIn0=";

#[test]
fn decodes_the_contract_fixture_token() {
    let token = IdentityToken::from_bearer(CONTRACT_TOKEN).expect("decode");
    assert_eq!(token.user_id, 123);
    assert_eq!(token.scopes_hash, "abc123");
    assert_eq!(token.raw, CONTRACT_TOKEN);
}

#[test]
fn rejects_empty_tokens() {
    assert!(matches!(IdentityToken::from_bearer(""), Err(TokenError::Empty)));
}

#[test]
fn rejects_missing_bearer_prefix() {
    let err = IdentityToken::from_bearer("Token abc").expect_err("prefix");
    assert!(matches!(err, TokenError::MissingPrefix));
}

#[test]
fn rejects_malformed_base64() {
    let err = IdentityToken::from_bearer("Bearer !!!not-base64!!!").expect_err("base64");
    assert!(matches!(err, TokenError::Base64(_)));
}

#[test]
fn rejects_payloads_missing_fields() {
    let bearer = format!(
        "Bearer {}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, r#"{"user_id": 1}"#)
    );
    let err = IdentityToken::from_bearer(&bearer).expect_err("payload");
    assert!(matches!(err, TokenError::Payload(_)));
}

#[test]
fn rejects_non_positive_user_ids() {
    let bearer = IdentityToken::generate_bearer(0, None);
    let err = IdentityToken::from_bearer(&bearer).expect_err("user id");
    assert!(matches!(err, TokenError::NonPositiveUserId));
}

#[test]
fn generated_tokens_round_trip() {
    let bearer = IdentityToken::generate_bearer(456, Some("hash456"));
    let token = IdentityToken::from_bearer(&bearer).expect("round trip");
    assert_eq!(token.user_id, 456);
    assert_eq!(token.scopes_hash, "hash456");
}
