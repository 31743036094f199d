// epx-store/src/sqlite.rs
// ============================================================================
// Module: EPX SQLite Store
// Description: SQLite-backed job and run repositories.
// Purpose: Persist control-plane state in a local WAL database.
// Dependencies: epx-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! One [`SqliteStore`] owns a shared connection (WAL journal, busy timeout,
//! foreign keys on) and implements both repository traits. Timestamps are
//! stored as RFC 3339 text, tags and metadata and the run request as JSON
//! text, statuses as their string enumerators; legacy run status aliases are
//! stored verbatim and normalized only through the domain's canonical
//! projection. Loads fail closed: a row that no longer maps onto the domain
//! model is a [`StoreError::Corrupt`], not a silent default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use epx_core::Job;
use epx_core::JobRepository;
use epx_core::JobStatus;
use epx_core::Run;
use epx_core::RunRepository;
use epx_core::RunStatus;
use epx_core::StoreError;
use epx_core::core::run::PodPhase;
use epx_core::core::timefmt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::types::Value as SqlValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Busy timeout applied to every connection (ms).
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema bootstrap executed on open.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL,
    tags            TEXT NOT NULL DEFAULT '[]',
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    input_location  TEXT,
    config_location TEXT,
    job_metadata    TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS runs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id              INTEGER NOT NULL REFERENCES jobs(id),
    user_id             INTEGER NOT NULL,
    request             TEXT NOT NULL,
    status              TEXT NOT NULL,
    pod_phase           TEXT NOT NULL,
    container_status    TEXT,
    epx_client_version  TEXT NOT NULL,
    config_url          TEXT,
    results_url         TEXT,
    results_uploaded_at TEXT,
    batch_executor_id   TEXT,
    user_deleted        INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_job_id ON runs(job_id);
CREATE INDEX IF NOT EXISTS idx_jobs_user_id ON jobs(user_id);
";

/// Every run status enumerator, for alias-aware filtering.
const ALL_RUN_STATUSES: [RunStatus; 8] = [
    RunStatus::Queued,
    RunStatus::NotStarted,
    RunStatus::Running,
    RunStatus::Done,
    RunStatus::Error,
    RunStatus::Submitted,
    RunStatus::Failed,
    RunStatus::Cancelled,
];

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a database failure to a store error.
fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Maps a poisoned-mutex failure to a store error.
fn poisoned() -> StoreError {
    StoreError::Backend("sqlite connection mutex poisoned".to_owned())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed store implementing both repositories.
pub struct SqliteStore {
    /// Shared connection; one writer at a time, WAL for readers.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be opened or the schema
    /// bootstrap fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(db_err)?;
        Self::bootstrap(connection)
    }

    /// Opens a private in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema bootstrap fails.
    pub fn in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(db_err)?;
        Self::bootstrap(connection)
    }

    /// Applies pragmas and the schema to a fresh connection.
    fn bootstrap(connection: Connection) -> Result<Self, StoreError> {
        connection
            .busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))
            .map_err(db_err)?;
        connection
            .pragma_update(None, "journal_mode", "wal")
            .map_err(db_err)?;
        connection
            .pragma_update(None, "foreign_keys", "on")
            .map_err(db_err)?;
        connection.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| poisoned())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps a `jobs` row onto the domain entity.
fn job_from_row(row: &Row<'_>) -> Result<Job, StoreError> {
    let status_raw: String = row.get("status").map_err(db_err)?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown job status {status_raw:?}")))?;
    let tags_raw: String = row.get("tags").map_err(db_err)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad tags payload: {err}")))?;
    let metadata_raw: String = row.get("job_metadata").map_err(db_err)?;
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad metadata payload: {err}")))?;
    let created_raw: String = row.get("created_at").map_err(db_err)?;
    let updated_raw: String = row.get("updated_at").map_err(db_err)?;
    Ok(Job {
        id: Some(row.get("id").map_err(db_err)?),
        user_id: row.get("user_id").map_err(db_err)?,
        tags,
        status,
        created_at: timefmt::parse_utc(&created_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        updated_at: timefmt::parse_utc(&updated_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        input_location: row.get("input_location").map_err(db_err)?,
        config_location: row.get("config_location").map_err(db_err)?,
        metadata,
    })
}

/// Maps a `runs` row onto the domain entity.
fn run_from_row(row: &Row<'_>) -> Result<Run, StoreError> {
    let status_raw: String = row.get("status").map_err(db_err)?;
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown run status {status_raw:?}")))?;
    let phase_raw: String = row.get("pod_phase").map_err(db_err)?;
    let pod_phase = PodPhase::parse(&phase_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown pod phase {phase_raw:?}")))?;
    let request_raw: String = row.get("request").map_err(db_err)?;
    let request = serde_json::from_str(&request_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad request payload: {err}")))?;
    let created_raw: String = row.get("created_at").map_err(db_err)?;
    let updated_raw: String = row.get("updated_at").map_err(db_err)?;
    let uploaded_raw: Option<String> = row.get("results_uploaded_at").map_err(db_err)?;
    let results_uploaded_at = uploaded_raw
        .map(|raw| timefmt::parse_utc(&raw).map_err(|err| StoreError::Corrupt(err.to_string())))
        .transpose()?;
    Ok(Run {
        id: Some(row.get("id").map_err(db_err)?),
        job_id: row.get("job_id").map_err(db_err)?,
        user_id: row.get("user_id").map_err(db_err)?,
        request,
        status,
        pod_phase,
        container_status: row.get("container_status").map_err(db_err)?,
        epx_client_version: row.get("epx_client_version").map_err(db_err)?,
        config_url: row.get("config_url").map_err(db_err)?,
        results_url: row.get("results_url").map_err(db_err)?,
        results_uploaded_at,
        batch_executor_id: row.get("batch_executor_id").map_err(db_err)?,
        user_deleted: row.get::<_, i64>("user_deleted").map_err(db_err)? != 0,
        created_at: timefmt::parse_utc(&created_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        updated_at: timefmt::parse_utc(&updated_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
    })
}

/// Returns the stored enumerators whose canonical value matches `status`.
fn run_status_aliases(status: RunStatus) -> Vec<&'static str> {
    ALL_RUN_STATUSES
        .iter()
        .filter(|candidate| candidate.canonically_eq(status))
        .map(|candidate| candidate.as_str())
        .collect()
}

// ============================================================================
// SECTION: Job Repository
// ============================================================================

impl JobRepository for SqliteStore {
    fn save(&self, job: &Job) -> Result<Job, StoreError> {
        let connection = self.lock()?;
        let tags = serde_json::to_string(&job.tags)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let metadata = serde_json::to_string(&job.metadata)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        connection
            .execute(
                "INSERT INTO jobs (id, user_id, tags, status, created_at, updated_at,
                                   input_location, config_location, job_metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     user_id = excluded.user_id,
                     tags = excluded.tags,
                     status = excluded.status,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at,
                     input_location = excluded.input_location,
                     config_location = excluded.config_location,
                     job_metadata = excluded.job_metadata",
                params![
                    job.id,
                    job.user_id,
                    tags,
                    job.status.as_str(),
                    timefmt::format_utc(job.created_at),
                    timefmt::format_utc(job.updated_at),
                    job.input_location,
                    job.config_location,
                    metadata,
                ],
            )
            .map_err(db_err)?;
        let id = job.id.unwrap_or_else(|| connection.last_insert_rowid());
        let mut persisted = job.clone();
        persisted.id = Some(id);
        tracing::debug!(job_id = id, user_id = job.user_id, "job saved");
        Ok(persisted)
    }

    fn find_by_id(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM jobs WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = statement.query(params![job_id]).map_err(db_err)?;
        match rows.next().map_err(db_err)? {
            Some(row) => Ok(Some(job_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM jobs WHERE user_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let mut rows = statement.query(params![user_id]).map_err(db_err)?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            jobs.push(job_from_row(row)?);
        }
        Ok(jobs)
    }

    fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM jobs WHERE status = ?1 ORDER BY id")
            .map_err(db_err)?;
        let mut rows = statement.query(params![status.as_str()]).map_err(db_err)?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            jobs.push(job_from_row(row)?);
        }
        Ok(jobs)
    }

    fn find_all(&self, limit: Option<u64>, offset: u64) -> Result<Vec<Job>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2")
            .map_err(db_err)?;
        let limit_value = limit.map_or(-1_i64, |value| i64::try_from(value).unwrap_or(i64::MAX));
        let offset_value = i64::try_from(offset).unwrap_or(i64::MAX);
        let mut rows = statement.query(params![limit_value, offset_value]).map_err(db_err)?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            jobs.push(job_from_row(row)?);
        }
        Ok(jobs)
    }

    fn exists(&self, job_id: i64) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM jobs WHERE id = ?1", params![job_id], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn delete(&self, job_id: i64) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let affected = connection
            .execute("DELETE FROM jobs WHERE id = ?1", params![job_id])
            .map_err(db_err)?;
        Ok(affected > 0)
    }
}

// ============================================================================
// SECTION: Run Repository
// ============================================================================

impl RunRepository for SqliteStore {
    fn save(&self, run: &Run) -> Result<Run, StoreError> {
        let connection = self.lock()?;
        let request = serde_json::to_string(&run.request)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        connection
            .execute(
                "INSERT INTO runs (id, job_id, user_id, request, status, pod_phase,
                                   container_status, epx_client_version, config_url,
                                   results_url, results_uploaded_at, batch_executor_id,
                                   user_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(id) DO UPDATE SET
                     job_id = excluded.job_id,
                     user_id = excluded.user_id,
                     request = excluded.request,
                     status = excluded.status,
                     pod_phase = excluded.pod_phase,
                     container_status = excluded.container_status,
                     epx_client_version = excluded.epx_client_version,
                     config_url = excluded.config_url,
                     results_url = excluded.results_url,
                     results_uploaded_at = excluded.results_uploaded_at,
                     batch_executor_id = excluded.batch_executor_id,
                     user_deleted = excluded.user_deleted,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at",
                params![
                    run.id,
                    run.job_id,
                    run.user_id,
                    request,
                    run.status.as_str(),
                    run.pod_phase.as_str(),
                    run.container_status,
                    run.epx_client_version,
                    run.config_url,
                    run.results_url,
                    run.results_uploaded_at.map(timefmt::format_utc),
                    run.batch_executor_id,
                    i64::from(run.user_deleted),
                    timefmt::format_utc(run.created_at),
                    timefmt::format_utc(run.updated_at),
                ],
            )
            .map_err(db_err)?;
        let id = run.id.unwrap_or_else(|| connection.last_insert_rowid());
        let mut persisted = run.clone();
        persisted.id = Some(id);
        tracing::debug!(run_id = id, job_id = run.job_id, "run saved");
        Ok(persisted)
    }

    fn find_by_id(&self, run_id: i64) -> Result<Option<Run>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM runs WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = statement.query(params![run_id]).map_err(db_err)?;
        match rows.next().map_err(db_err)? {
            Some(row) => Ok(Some(run_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_by_job_id(&self, job_id: i64) -> Result<Vec<Run>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM runs WHERE job_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let mut rows = statement.query(params![job_id]).map_err(db_err)?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            runs.push(run_from_row(row)?);
        }
        Ok(runs)
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Run>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM runs WHERE user_id = ?1 ORDER BY id")
            .map_err(db_err)?;
        let mut rows = statement.query(params![user_id]).map_err(db_err)?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            runs.push(run_from_row(row)?);
        }
        Ok(runs)
    }

    fn find_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let aliases = run_status_aliases(status);
        let placeholders = (1..=aliases.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT * FROM runs WHERE status IN ({placeholders}) ORDER BY id");
        let connection = self.lock()?;
        let mut statement = connection.prepare(&sql).map_err(db_err)?;
        let values: Vec<SqlValue> = aliases
            .into_iter()
            .map(|alias| SqlValue::Text(alias.to_owned()))
            .collect();
        let mut rows = statement
            .query(rusqlite::params_from_iter(values))
            .map_err(db_err)?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            runs.push(run_from_row(row)?);
        }
        Ok(runs)
    }

    fn exists(&self, run_id: i64) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM runs WHERE id = ?1", params![run_id], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn delete(&self, run_id: i64) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let affected = connection
            .execute("DELETE FROM runs WHERE id = ?1", params![run_id])
            .map_err(db_err)?;
        Ok(affected > 0)
    }
}
