// epx-core/src/core/packaging/tests.rs
// ============================================================================
// Module: Results Packaging Tests
// Description: Unit tests for results directory zipping.
// Purpose: Validate RUN* detection, archive prefixes, and rejection paths.
// Dependencies: tempfile, zip
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::io::Cursor;
use std::io::Read;
use std::path::Path;

use tempfile::TempDir;
use zip::ZipArchive;

use super::PackagingError;
use super::package_directory;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, contents).expect("write");
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).expect("archive");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_owned())
        .collect()
}

#[test]
fn single_run_directory_gains_its_basename_prefix() {
    let tmp = TempDir::new().expect("tempdir");
    let run_dir = tmp.path().join("RUN4");
    write_file(&run_dir.join("out.csv"), "a,b\n1,2\n");
    let packaged = package_directory(&run_dir).expect("package");
    assert_eq!(entry_names(&packaged.bytes), vec!["RUN4/out.csv"]);
    assert_eq!(packaged.file_count, 1);
    assert_eq!(packaged.directory_name, "RUN4");
    assert_eq!(packaged.total_bytes, packaged.bytes.len());
}

#[test]
fn parent_directory_preserves_relative_paths() {
    let tmp = TempDir::new().expect("tempdir");
    write_file(&tmp.path().join("RUN1/data.txt"), "one");
    write_file(&tmp.path().join("RUN2/nested/data.txt"), "two");
    let packaged = package_directory(tmp.path()).expect("package");
    let names = entry_names(&packaged.bytes);
    assert!(names.contains(&"RUN1/data.txt".to_owned()));
    assert!(names.contains(&"RUN2/nested/data.txt".to_owned()));
    assert_eq!(packaged.file_count, 2);
}

#[test]
fn stray_top_level_files_ride_along_in_parent_mode() {
    let tmp = TempDir::new().expect("tempdir");
    write_file(&tmp.path().join("RUN1/data.txt"), "one");
    write_file(&tmp.path().join("notes.log"), "log");
    let packaged = package_directory(tmp.path()).expect("package");
    let names = entry_names(&packaged.bytes);
    assert!(names.contains(&"notes.log".to_owned()));
}

#[test]
fn archive_entries_round_trip_contents() {
    let tmp = TempDir::new().expect("tempdir");
    let run_dir = tmp.path().join("RUN9");
    write_file(&run_dir.join("out.csv"), "payload");
    let packaged = package_directory(&run_dir).expect("package");
    let mut archive = ZipArchive::new(Cursor::new(packaged.bytes)).expect("archive");
    let mut entry = archive.by_name("RUN9/out.csv").expect("entry");
    let mut contents = String::new();
    entry.read_to_string(&mut contents).expect("read");
    assert_eq!(contents, "payload");
}

#[test]
fn missing_directory_is_invalid() {
    let tmp = TempDir::new().expect("tempdir");
    let missing = tmp.path().join("absent");
    assert!(matches!(
        package_directory(&missing),
        Err(PackagingError::InvalidResultsDirectory(_))
    ));
}

#[test]
fn directory_without_run_layout_is_invalid() {
    let tmp = TempDir::new().expect("tempdir");
    write_file(&tmp.path().join("data.txt"), "stray");
    assert!(matches!(
        package_directory(tmp.path()),
        Err(PackagingError::InvalidResultsDirectory(_))
    ));
}

#[test]
fn lowercase_run_directories_are_recognized() {
    let tmp = TempDir::new().expect("tempdir");
    let run_dir = tmp.path().join("run7");
    write_file(&run_dir.join("out.csv"), "x");
    let packaged = package_directory(&run_dir).expect("package");
    assert_eq!(entry_names(&packaged.bytes), vec!["run7/out.csv"]);
}
