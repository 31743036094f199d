// epx-config/src/app/tests.rs
// ============================================================================
// Module: Application Config Tests
// Description: Unit tests for service-level configuration resolution.
// Purpose: Validate defaults, environment selection, and error paths.
// Dependencies: std
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::collections::HashMap;

use super::AppConfig;
use super::ConfigError;
use super::Environment;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn production_requires_a_bucket() {
    let env = lookup(&[("ENVIRONMENT", "PRODUCTION")]);
    let err = AppConfig::from_lookup(&env).expect_err("bucket required");
    assert!(matches!(err, ConfigError::MissingVariable("S3_UPLOAD_BUCKET")));
}

#[test]
fn testing_runs_without_a_bucket() {
    let env = lookup(&[("ENVIRONMENT", "TESTING")]);
    let config = AppConfig::from_lookup(&env).expect("config");
    assert_eq!(config.environment, Environment::Testing);
    assert!(config.environment.is_testing());
    assert!(config.upload_bucket.is_empty());
}

#[test]
fn defaults_fill_host_port_region_and_batch_wiring() {
    let env = lookup(&[("S3_UPLOAD_BUCKET", "epx-uploads-prod")]);
    let config = AppConfig::from_lookup(&env).expect("config");
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 5000);
    assert_eq!(config.aws_region, "us-east-1");
    assert_eq!(config.batch.job_queue, "epx-simulation-queue");
    assert_eq!(config.batch.job_definition, "epx-simulation-runner");
}

#[test]
fn explicit_values_override_defaults() {
    let env = lookup(&[
        ("ENVIRONMENT", "development"),
        ("EPX_HOST", "127.0.0.1"),
        ("EPX_PORT", "8080"),
        ("S3_UPLOAD_BUCKET", "epx-uploads-dev"),
        ("AWS_REGION", "us-west-2"),
        ("BATCH_JOB_QUEUE", "custom-queue"),
        ("BATCH_JOB_DEFINITION", "custom-def"),
    ]);
    let config = AppConfig::from_lookup(&env).expect("config");
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.aws_region, "us-west-2");
    assert_eq!(config.batch.job_queue, "custom-queue");
    assert_eq!(config.batch.job_definition, "custom-def");
}

#[test]
fn malformed_ports_are_rejected() {
    let env = lookup(&[("ENVIRONMENT", "TESTING"), ("EPX_PORT", "not-a-port")]);
    let err = AppConfig::from_lookup(&env).expect_err("port");
    assert!(matches!(err, ConfigError::InvalidValue { variable: "EPX_PORT", .. }));
}

#[test]
fn unknown_environment_values_fall_back_to_production() {
    assert_eq!(Environment::parse("staging"), Environment::Production);
    assert_eq!(Environment::parse("testing"), Environment::Testing);
    assert_eq!(Environment::parse("DEVELOPMENT"), Environment::Development);
}
