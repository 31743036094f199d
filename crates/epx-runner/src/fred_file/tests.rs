// epx-runner/src/fred_file/tests.rs
// ============================================================================
// Module: Simulator Input Builder Tests
// Description: Unit tests for header injection and date conversion.
// Purpose: Validate the legacy dialect rewrite and run-number derivation.
// Dependencies: serde_json, tempfile
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use super::FredFileBuilder;
use super::FredFileError;
use super::convert_date_to_legacy;

fn base_file(tmp: &TempDir) -> PathBuf {
    let path = tmp.path().join("main.fred");
    std::fs::write(&path, "simulation {\n  model = base\n}\n").expect("write");
    path
}

#[test]
fn iso_dates_convert_to_the_legacy_form() {
    assert_eq!(convert_date_to_legacy("2020-01-01").expect("date"), "2020-Jan-01");
    assert_eq!(convert_date_to_legacy("2020-03-31").expect("date"), "2020-Mar-31");
    assert_eq!(convert_date_to_legacy("2025-11-08").expect("date"), "2025-Nov-08");
}

#[test]
fn malformed_dates_are_rejected() {
    assert!(matches!(convert_date_to_legacy("01/01/2020"), Err(FredFileError::BadDate(_))));
    assert!(matches!(convert_date_to_legacy("2020-13-01"), Err(FredFileError::BadDate(_))));
}

#[test]
fn missing_base_files_are_rejected() {
    assert!(matches!(
        FredFileBuilder::new("/definitely/not/main.fred"),
        Err(FredFileError::MissingInput(_))
    ));
}

#[test]
fn build_prepends_the_parameter_header() {
    let tmp = TempDir::new().expect("tempdir");
    let base = base_file(&tmp);
    let output = tmp.path().join("run_4_prepared.fred");

    FredFileBuilder::new(&base)
        .expect("builder")
        .with_dates("2020-01-01", Some("2020-03-31"))
        .expect("dates")
        .with_locations(vec!["Allegheny_County_PA".to_owned(), "Erie_County_PA".to_owned()])
        .with_seed(42)
        .build(&output)
        .expect("build");

    let prepared = std::fs::read_to_string(&output).expect("read");
    assert!(prepared.contains("start_date = 2020-Jan-01"));
    assert!(prepared.contains("end_date = 2020-Mar-31"));
    assert!(prepared.contains("locations = Allegheny_County_PA"));
    assert!(prepared.contains("locations = Erie_County_PA"));
    assert!(prepared.contains("# Original seed: 42"));
    // The base content survives unchanged at the end.
    assert!(prepared.ends_with("simulation {\n  model = base\n}\n"));
}

#[test]
fn build_without_parameters_still_copies_the_base() {
    let tmp = TempDir::new().expect("tempdir");
    let base = base_file(&tmp);
    let output = tmp.path().join("prepared.fred");
    FredFileBuilder::new(&base).expect("builder").build(&output).expect("build");
    let prepared = std::fs::read_to_string(&output).expect("read");
    assert!(prepared.contains("model = base"));
    assert!(!prepared.contains("SIMULATED TIMEFRAME"));
}

#[test]
fn from_run_config_extracts_the_parameter_set() {
    let tmp = TempDir::new().expect("tempdir");
    let base = base_file(&tmp);
    let config_path = tmp.path().join("run_4_config.json");
    std::fs::write(
        &config_path,
        serde_json::json!({
            "params": {
                "start_date": "2020-01-01",
                "end_date": "2020-02-01",
                "synth_pop": {"locations": ["Allegheny_County_PA"]},
                "seed": 6_401_899_875_233_727_325_i64,
            }
        })
        .to_string(),
    )
    .expect("write config");

    let builder = FredFileBuilder::from_run_config(&config_path, &base).expect("builder");
    let output = tmp.path().join("prepared.fred");
    builder.build(&output).expect("build");
    let prepared = std::fs::read_to_string(&output).expect("read");
    assert!(prepared.contains("start_date = 2020-Jan-01"));
    assert!(prepared.contains("locations = Allegheny_County_PA"));
}

#[test]
fn run_numbers_fold_the_seed_into_sixteen_bits() {
    let tmp = TempDir::new().expect("tempdir");
    let base = base_file(&tmp);
    let builder = FredFileBuilder::new(&base).expect("builder").with_seed(6_401_899_875_233_727_325);
    let run_number = builder.run_number();
    assert!(run_number >= 1);
    assert!(run_number <= 65_536);
    assert_eq!(run_number, 6_401_899_875_233_727_325_i64.rem_euclid(65_536) + 1);

    let unseeded = FredFileBuilder::new(&base).expect("builder");
    assert_eq!(unseeded.run_number(), 1);
}

#[test]
fn missing_run_configs_are_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    let base = base_file(&tmp);
    let err = FredFileBuilder::from_run_config(Path::new("/no/such/config.json"), &base)
        .expect_err("missing config");
    assert!(matches!(err, FredFileError::BadRunConfig { .. }));
}
