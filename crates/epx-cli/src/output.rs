// epx-cli/src/output.rs
// ============================================================================
// Module: EPX CLI Output
// Description: Human-readable rendering of controller responses.
// Purpose: Keep table formatting pure and testable.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Renderers take the controller's serialized responses and produce the text
//! tables operators read; `--json-output` bypasses them entirely. Rendering
//! never fails: missing fields print as dashes rather than erroring, since
//! the store may hold records written by older deployments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders an optional string field, dash when absent.
fn text_or_dash(value: &Value) -> String {
    value.as_str().map_or_else(|| "-".to_owned(), ToOwned::to_owned)
}

/// Renders an optional integer field, dash when absent.
fn int_or_dash(value: &Value) -> String {
    value.as_i64().map_or_else(|| "-".to_owned(), |id| id.to_string())
}

// ============================================================================
// SECTION: Renderers
// ============================================================================

/// Renders the `jobs list` table.
#[must_use]
pub fn format_jobs_list(jobs: &[Value]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_owned();
    }
    let mut lines = vec![
        format!("{:<8} {:<8} {:<12} {:<22} TAGS", "ID", "USER", "STATUS", "CREATED"),
        "-".repeat(72),
    ];
    for job in jobs {
        let tags = job["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        lines.push(format!(
            "{:<8} {:<8} {:<12} {:<22} {}",
            int_or_dash(&job["id"]),
            int_or_dash(&job["userId"]),
            text_or_dash(&job["status"]),
            text_or_dash(&job["createdAt"]),
            tags,
        ));
    }
    lines.push(format!("\n{} job(s)", jobs.len()));
    lines.join("\n")
}

/// Renders the `jobs info` view: one job plus its runs.
#[must_use]
pub fn format_job_info(job: &Value, runs: &[Value]) -> String {
    let mut lines = vec![
        format!("Job {}", int_or_dash(&job["id"])),
        format!("  user:    {}", int_or_dash(&job["userId"])),
        format!("  status:  {}", text_or_dash(&job["status"])),
        format!("  created: {}", text_or_dash(&job["createdAt"])),
        format!("  updated: {}", text_or_dash(&job["updatedAt"])),
    ];
    if let Some(input_location) = job["inputLocation"].as_str() {
        lines.push(format!("  input:   {input_location}"));
    }
    if let Some(config_location) = job["configLocation"].as_str() {
        lines.push(format!("  config:  {config_location}"));
    }
    if runs.is_empty() {
        lines.push("  runs:    none".to_owned());
    } else {
        lines.push(format!("  runs:    {}", runs.len()));
        for run in runs {
            lines.push(format!(
                "    run {:<6} {:<10} {:<10} results: {}",
                int_or_dash(&run["id"]),
                text_or_dash(&run["status"]),
                text_or_dash(&run["podPhase"]),
                text_or_dash(&run["results_url"]),
            ));
        }
    }
    lines.join("\n")
}

/// Renders the `jobs uploads list` view.
#[must_use]
pub fn format_uploads(uploads: &[Value]) -> String {
    if uploads.is_empty() {
        return "No uploads found.".to_owned();
    }
    let mut lines = Vec::new();
    for upload in uploads {
        lines.push(format!(
            "{}/{} (job {}{})",
            text_or_dash(&upload["context"]),
            text_or_dash(&upload["uploadType"]),
            int_or_dash(&upload["jobId"]),
            upload["runId"]
                .as_i64()
                .map(|run_id| format!(", run {run_id}"))
                .unwrap_or_default(),
        ));
        if let Some(url) = upload["location"]["url"].as_str() {
            lines.push(format!("  location: {url}"));
        }
        if let Some(error) = upload["error"].as_str() {
            lines.push(format!("  error: {error}"));
        }
        if let Some(content) = upload["content"]["content"].as_str() {
            for line in content.lines().take(12) {
                lines.push(format!("  | {line}"));
            }
        }
    }
    lines.push(format!("\n{} upload(s)", uploads.len()));
    lines.join("\n")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
