// epx-core/src/core/packaging.rs
// ============================================================================
// Module: EPX Results Packaging
// Description: Zip packaging of simulator results directories.
// Purpose: Produce one deflate archive preserving the RUN*/ tree layout.
// Dependencies: thiserror, zip
// ============================================================================

//! ## Overview
//! Simulator output lands either in a single `RUN*` directory or in a parent
//! directory holding one or more `RUN*` children. Packaging zips the tree so
//! the `RUN*/` prefix survives at the archive root in both cases; anything
//! else is an [`PackagingError::InvalidResultsDirectory`]. The produced
//! [`PackagedResults`] is immutable once built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Results packaging failures.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// The results directory is missing, not a directory, or has no RUN* tree.
    #[error("invalid results directory: {0}")]
    InvalidResultsDirectory(String),
    /// Filesystem or archive write failure.
    #[error("failed to package results: {0}")]
    Packaging(String),
}

// ============================================================================
// SECTION: Packaged Results
// ============================================================================

/// Immutable packaged results archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedResults {
    /// Deflate-compressed zip bytes.
    pub bytes: Vec<u8>,
    /// Number of files included.
    pub file_count: usize,
    /// Total archive size in bytes.
    pub total_bytes: usize,
    /// Basename of the packaged directory.
    pub directory_name: String,
}

// ============================================================================
// SECTION: Directory Scanning
// ============================================================================

/// Returns the RUN* subdirectories of `path`, sorted for determinism.
fn find_run_directories(path: &Path) -> Result<Vec<PathBuf>, PackagingError> {
    let mut run_dirs = Vec::new();
    let entries = std::fs::read_dir(path)
        .map_err(|err| PackagingError::Packaging(format!("failed to read {}: {err}", path.display())))?;
    for entry in entries {
        let entry = entry
            .map_err(|err| PackagingError::Packaging(format!("failed to read {}: {err}", path.display())))?;
        let entry_path = entry.path();
        if entry_path.is_dir() && is_run_directory(&entry_path) {
            run_dirs.push(entry_path);
        }
    }
    run_dirs.sort();
    Ok(run_dirs)
}

/// Returns true when the path's basename starts with `RUN` (case-insensitive).
fn is_run_directory(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_uppercase().starts_with("RUN"))
}

/// Collects every file under `root` recursively, sorted for determinism.
fn collect_files(root: &Path, into: &mut Vec<PathBuf>) -> Result<(), PackagingError> {
    let entries = std::fs::read_dir(root)
        .map_err(|err| PackagingError::Packaging(format!("failed to read {}: {err}", root.display())))?;
    let mut children: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|err| PackagingError::Packaging(format!("failed to read {}: {err}", root.display())))?;
        children.push(entry.path());
    }
    children.sort();
    for child in children {
        if child.is_dir() {
            collect_files(&child, into)?;
        } else {
            into.push(child);
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Packaging
// ============================================================================

/// Packages a results directory into a deflate zip archive.
///
/// When `results_dir` itself is a `RUN*` directory, members are prefixed with
/// its basename; when it contains `RUN*` children, member paths are relative
/// to `results_dir`.
///
/// # Errors
///
/// Returns [`PackagingError::InvalidResultsDirectory`] when the directory is
/// missing or carries no `RUN*` layout, and [`PackagingError::Packaging`] on
/// I/O or archive failures.
pub fn package_directory(results_dir: &Path) -> Result<PackagedResults, PackagingError> {
    if !results_dir.exists() {
        return Err(PackagingError::InvalidResultsDirectory(format!(
            "results directory does not exist: {}",
            results_dir.display()
        )));
    }
    if !results_dir.is_dir() {
        return Err(PackagingError::InvalidResultsDirectory(format!(
            "results path is not a directory: {}",
            results_dir.display()
        )));
    }

    let run_dirs = find_run_directories(results_dir)?;
    let is_single_run = is_run_directory(results_dir);
    if run_dirs.is_empty() && !is_single_run {
        return Err(PackagingError::InvalidResultsDirectory(format!(
            "no simulator output directories (RUN*) found in {}; pass the parent directory \
             containing RUN*/ subdirectories or a single RUN* directory",
            results_dir.display()
        )));
    }

    let directory_name = results_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_owned();

    let mut files = Vec::new();
    collect_files(results_dir, &mut files)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut file_count = 0_usize;
    for file_path in &files {
        let relative = file_path.strip_prefix(results_dir).map_err(|err| {
            PackagingError::Packaging(format!("path {} escaped the results tree: {err}", file_path.display()))
        })?;
        // Parent-directory case keeps paths relative; single-RUN* case gains
        // the directory basename so the RUN*/ prefix survives at zip root.
        let archive_name = if run_dirs.is_empty() {
            Path::new(&directory_name).join(relative)
        } else {
            relative.to_path_buf()
        };
        let archive_name = archive_name.to_string_lossy().replace('\\', "/");
        writer
            .start_file(&archive_name, options)
            .map_err(|err| PackagingError::Packaging(format!("failed to add {archive_name}: {err}")))?;
        let mut contents = Vec::new();
        File::open(file_path)
            .and_then(|mut file| file.read_to_end(&mut contents))
            .map_err(|err| {
                PackagingError::Packaging(format!("failed to read {}: {err}", file_path.display()))
            })?;
        writer
            .write_all(&contents)
            .map_err(|err| PackagingError::Packaging(format!("failed to write {archive_name}: {err}")))?;
        file_count += 1;
    }
    let cursor = writer
        .finish()
        .map_err(|err| PackagingError::Packaging(format!("failed to finish archive: {err}")))?;
    let bytes = cursor.into_inner();
    let total_bytes = bytes.len();

    Ok(PackagedResults {
        bytes,
        file_count,
        total_bytes,
        directory_name,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
