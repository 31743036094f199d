// epx-runner/src/fred_file.rs
// ============================================================================
// Module: EPX Simulator Input Builder
// Description: Legacy in-file-parameter rewriting for simulator inputs.
// Purpose: Prepend run parameters to a copy of the base .fred file.
// Dependencies: serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Newer clients pass run parameters on the command line; the deployed
//! simulator reads them from the top of the input file. The builder takes
//! `main.fred`, converts ISO dates (`YYYY-MM-DD`) into the legacy
//! `YYYY-Mon-DD` form, and writes a prepared copy with a generated header:
//! dates, one `locations =` line per location, and the seed recorded as a
//! comment (the seed itself rides through the `-r` run number).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// ISO date layout accepted from run configs.
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// Legacy date layout the simulator parses.
const LEGACY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month repr:short]-[day]");
/// Run numbers are 16-bit; seeds fold into them modulo this.
const MAX_RUN_NUMBER: i64 = 65_536;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Input-file preparation failures.
#[derive(Debug, Error)]
pub enum FredFileError {
    /// Base input file missing.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),
    /// Run config missing or unparseable.
    #[error("failed to load run config from {path}: {reason}")]
    BadRunConfig {
        /// Config path.
        path: PathBuf,
        /// Parser-reported reason.
        reason: String,
    },
    /// Date outside the accepted ISO form.
    #[error("invalid date format: {0}")]
    BadDate(String),
    /// Filesystem failure while reading or writing.
    #[error("{0}")]
    Io(String),
}

// ============================================================================
// SECTION: Date Conversion
// ============================================================================

/// Converts an ISO date (`2020-01-01`) to the legacy form (`2020-Jan-01`).
///
/// # Errors
///
/// Returns [`FredFileError::BadDate`] for anything that is not a valid ISO
/// date.
pub fn convert_date_to_legacy(iso_date: &str) -> Result<String, FredFileError> {
    let date = Date::parse(iso_date, ISO_DATE)
        .map_err(|err| FredFileError::BadDate(format!("{iso_date}: {err}")))?;
    date.format(LEGACY_DATE)
        .map_err(|err| FredFileError::BadDate(format!("{iso_date}: {err}")))
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder producing a prepared simulator input file.
#[derive(Debug)]
pub struct FredFileBuilder {
    /// Base input file (`main.fred`).
    input_path: PathBuf,
    /// Converted start date, when set.
    start_date: Option<String>,
    /// Converted end date, when set.
    end_date: Option<String>,
    /// Simulation locations.
    locations: Vec<String>,
    /// Random seed, when set.
    seed: Option<i64>,
}

impl FredFileBuilder {
    /// Creates a builder over an existing base file.
    ///
    /// # Errors
    ///
    /// Returns [`FredFileError::MissingInput`] when the base file is absent.
    pub fn new(input_path: impl Into<PathBuf>) -> Result<Self, FredFileError> {
        let input_path = input_path.into();
        if !input_path.exists() {
            return Err(FredFileError::MissingInput(input_path));
        }
        Ok(Self {
            input_path,
            start_date: None,
            end_date: None,
            locations: Vec::new(),
            seed: None,
        })
    }

    /// Adds the simulation timeframe, converting from ISO dates.
    ///
    /// # Errors
    ///
    /// Returns [`FredFileError::BadDate`] for malformed dates.
    pub fn with_dates(mut self, start_date: &str, end_date: Option<&str>) -> Result<Self, FredFileError> {
        self.start_date = Some(convert_date_to_legacy(start_date)?);
        if let Some(end_date) = end_date {
            self.end_date = Some(convert_date_to_legacy(end_date)?);
        }
        Ok(self)
    }

    /// Adds the simulation locations.
    #[must_use]
    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations;
        self
    }

    /// Adds the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Creates a builder from a run config JSON file.
    ///
    /// Reads `params.start_date`, `params.end_date`,
    /// `params.synth_pop.locations`, and `params.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`FredFileError`] when the config or dates are malformed.
    pub fn from_run_config(
        run_config_path: &Path,
        input_path: impl Into<PathBuf>,
    ) -> Result<Self, FredFileError> {
        let raw = std::fs::read_to_string(run_config_path).map_err(|err| FredFileError::BadRunConfig {
            path: run_config_path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let config: serde_json::Value =
            serde_json::from_str(&raw).map_err(|err| FredFileError::BadRunConfig {
                path: run_config_path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let params = config.get("params").cloned().unwrap_or_default();

        let mut builder = Self::new(input_path)?;
        if let Some(start_date) = params.get("start_date").and_then(serde_json::Value::as_str) {
            let end_date = params.get("end_date").and_then(serde_json::Value::as_str);
            builder = builder.with_dates(start_date, end_date)?;
        }
        if let Some(locations) = params
            .get("synth_pop")
            .and_then(|synth_pop| synth_pop.get("locations"))
            .and_then(serde_json::Value::as_array)
        {
            builder = builder.with_locations(
                locations
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect(),
            );
        }
        if let Some(seed) = params.get("seed").and_then(serde_json::Value::as_i64) {
            builder = builder.with_seed(seed);
        }
        tracing::info!(
            run_config = %run_config_path.display(),
            start_date = builder.start_date.as_deref(),
            end_date = builder.end_date.as_deref(),
            location_count = builder.locations.len(),
            seed = builder.seed,
            "loaded run config"
        );
        Ok(builder)
    }

    /// Renders the generated parameter header.
    fn header(&self) -> String {
        let mut lines = vec![
            "##################################################".to_owned(),
            "# Simulator configuration".to_owned(),
            "# Generated from the run config".to_owned(),
            "##################################################".to_owned(),
            String::new(),
        ];
        if let Some(start_date) = &self.start_date {
            lines.push("##### SIMULATED TIMEFRAME".to_owned());
            lines.push(format!("start_date = {start_date}"));
            if let Some(end_date) = &self.end_date {
                lines.push(format!("end_date = {end_date}"));
            }
            lines.push(String::new());
        }
        if !self.locations.is_empty() {
            lines.push("##### SIMULATED LOCATION".to_owned());
            for location in &self.locations {
                lines.push(format!("locations = {location}"));
            }
            lines.push(String::new());
        }
        if let Some(seed) = self.seed {
            lines.push("##### RANDOM SEED".to_owned());
            lines.push(format!("# Original seed: {seed}"));
            lines.push("# (the -r run number carries the seed)".to_owned());
            lines.push(String::new());
        }
        lines.push("##################################################".to_owned());
        lines.push(String::new());
        lines.join("\n")
    }

    /// Writes the prepared file: generated header plus the base content.
    ///
    /// # Errors
    ///
    /// Returns [`FredFileError::Io`] on filesystem failures.
    pub fn build(&self, output_path: &Path) -> Result<PathBuf, FredFileError> {
        let original = std::fs::read_to_string(&self.input_path).map_err(|err| {
            FredFileError::Io(format!("failed to read {}: {err}", self.input_path.display()))
        })?;
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                FredFileError::Io(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let prepared = format!("{}{original}", self.header());
        std::fs::write(output_path, prepared).map_err(|err| {
            FredFileError::Io(format!("failed to write {}: {err}", output_path.display()))
        })?;
        tracing::info!(
            input = %self.input_path.display(),
            output = %output_path.display(),
            "generated prepared simulator input"
        );
        Ok(output_path.to_path_buf())
    }

    /// Derives the 16-bit run number from the seed.
    #[must_use]
    pub const fn run_number(&self) -> i64 {
        match self.seed {
            Some(seed) => seed.rem_euclid(MAX_RUN_NUMBER) + 1,
            None => 1,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
