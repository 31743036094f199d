// epx-store/src/postgres.rs
// ============================================================================
// Module: EPX PostgreSQL Store
// Description: PostgreSQL-backed repositories behind a recycling pool.
// Purpose: Production persistence with static-password or short-lived-token
//          authentication.
// Dependencies: epx-config, epx-core, tokio-postgres, rustls
// ============================================================================

//! ## Overview
//! The pool has two constructors, one per authentication mode. Static
//! passwords ride in the connection URL; the token mode minted a fresh token
//! through [`DbTokenMinter`] for every new physical connection, recycles
//! connections strictly before the token lifetime, and requires TLS. Before a
//! connection is lent out it is age-checked and (when `pre_ping` is set)
//! probed with `SELECT 1`. The async driver is bridged to the synchronous
//! repository traits with an owned runtime; calls arriving on a multi-thread
//! runtime worker hop through `block_in_place`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use epx_config::IamAuthSettings;
use epx_config::PoolSettings;
use epx_core::Job;
use epx_core::JobRepository;
use epx_core::JobStatus;
use epx_core::Run;
use epx_core::RunRepository;
use epx_core::RunStatus;
use epx_core::StoreError;
use epx_core::core::run::PodPhase;
use epx_core::core::timefmt;
use tokio::runtime::Builder;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;
use tokio_postgres::Client;
use tokio_postgres::NoTls;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tokio_postgres_rustls::MakeRustlsConnect;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connect timeout for new physical connections.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Schema bootstrap executed on store construction.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id              BIGSERIAL PRIMARY KEY,
    user_id         BIGINT NOT NULL,
    tags            TEXT NOT NULL DEFAULT '[]',
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    input_location  TEXT,
    config_location TEXT,
    job_metadata    TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS runs (
    id                  BIGSERIAL PRIMARY KEY,
    job_id              BIGINT NOT NULL REFERENCES jobs(id),
    user_id             BIGINT NOT NULL,
    request             TEXT NOT NULL,
    status              TEXT NOT NULL,
    pod_phase           TEXT NOT NULL,
    container_status    TEXT,
    epx_client_version  TEXT NOT NULL,
    config_url          TEXT,
    results_url         TEXT,
    results_uploaded_at TEXT,
    batch_executor_id   TEXT,
    user_deleted        BIGINT NOT NULL DEFAULT 0,
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
// SECTION: Token Minter
// ============================================================================

/// Mints short-lived database auth tokens.
///
/// The deployment platform provides the implementation (signing the token
/// against its identity service); tests inject fakes.
pub trait DbTokenMinter: Send + Sync {
    /// Mints a token for one new physical connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the token service rejects the request.
    fn mint_token(&self, settings: &IamAuthSettings) -> Result<String, StoreError>;
}

/// Token minter that shells out to an operator-supplied command.
///
/// The command receives the connection settings as `DATABASE_HOST`,
/// `DATABASE_PORT`, `DATABASE_NAME`, `DATABASE_IAM_USER`, and `AWS_REGION`
/// environment variables and must print the token on stdout. This mirrors
/// the exec-credential pattern used for cluster credential helpers.
pub struct ExecTokenMinter {
    /// Shell command line to execute.
    command: String,
}

impl ExecTokenMinter {
    /// Creates a minter for a command line.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl DbTokenMinter for ExecTokenMinter {
    fn mint_token(&self, settings: &IamAuthSettings) -> Result<String, StoreError> {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("DATABASE_HOST", &settings.host)
            .env("DATABASE_PORT", settings.port.to_string())
            .env("DATABASE_NAME", &settings.database)
            .env("DATABASE_IAM_USER", &settings.user)
            .env("AWS_REGION", &settings.region)
            .output()
            .map_err(|err| StoreError::Backend(format!("token command failed to start: {err}")))?;
        if !output.status.success() {
            // Never echo command output; it may carry the token.
            return Err(StoreError::Backend(format!(
                "token command exited with {}",
                output.status
            )));
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if token.is_empty() {
            return Err(StoreError::Backend("token command printed no token".to_owned()));
        }
        Ok(token)
    }
}

// ============================================================================
// SECTION: Runtime Bridge
// ============================================================================

/// Blocks on a store future using a compatible runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send,
    T: Send,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| runtime.block_on(future));
        }
        return std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(future))
                .join()
                .unwrap_or_else(|_| Err(StoreError::Backend("store thread join failed".to_owned())))
        });
    }
    runtime.block_on(future)
}

// ============================================================================
// SECTION: Pool
// ============================================================================

/// How new physical connections are opened.
enum Connector {
    /// Static-password URL.
    Password {
        /// Full connection URL.
        url: String,
    },
    /// Short-lived-token mode.
    Iam {
        /// Connection settings.
        settings: IamAuthSettings,
        /// Token source.
        minter: Arc<dyn DbTokenMinter>,
    },
}

/// One pooled physical connection.
struct PooledConnection {
    /// Driver client.
    client: Client,
    /// When the connection was opened.
    opened_at: Instant,
}

/// Small recycling connection pool over tokio-postgres.
pub struct PgPool {
    /// Owned runtime driving connections and queries.
    runtime: Arc<Runtime>,
    /// Idle connections.
    idle: Mutex<Vec<PooledConnection>>,
    /// Connection opener.
    connector: Connector,
    /// Pool tuning.
    settings: PoolSettings,
}

impl PgPool {
    /// Creates a pool authenticating with the credentials in the URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the runtime cannot be built.
    pub fn with_password(url: &str, settings: PoolSettings) -> Result<Self, StoreError> {
        Ok(Self {
            runtime: build_runtime()?,
            idle: Mutex::new(Vec::new()),
            connector: Connector::Password { url: url.to_owned() },
            settings,
        })
    }

    /// Creates a pool minting a fresh token per new physical connection.
    ///
    /// The recycle interval must sit strictly below the token lifetime so no
    /// pooled connection outlives the token that opened it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings violate the token lifetime
    /// bound or the runtime cannot be built.
    pub fn with_iam_tokens(
        settings: IamAuthSettings,
        minter: Arc<dyn DbTokenMinter>,
    ) -> Result<Self, StoreError> {
        if settings.pool.recycle_seconds >= settings.token_lifetime_seconds {
            return Err(StoreError::Backend(format!(
                "pool recycle interval {}s must be strictly below token lifetime {}s",
                settings.pool.recycle_seconds, settings.token_lifetime_seconds
            )));
        }
        let pool_settings = settings.pool.clone();
        Ok(Self {
            runtime: build_runtime()?,
            idle: Mutex::new(Vec::new()),
            connector: Connector::Iam { settings, minter },
            settings: pool_settings,
        })
    }

    /// Runs a query returning rows.
    fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, StoreError> {
        let connection = self.acquire()?;
        let result = block_on_with_runtime(&self.runtime, async {
            connection
                .client
                .query(sql, params)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))
        });
        self.release(connection, result.is_ok());
        result
    }

    /// Runs a statement returning the affected row count.
    fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, StoreError> {
        let connection = self.acquire()?;
        let result = block_on_with_runtime(&self.runtime, async {
            connection
                .client
                .execute(sql, params)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))
        });
        self.release(connection, result.is_ok());
        result
    }

    /// Runs a multi-statement batch.
    fn batch_execute(&self, sql: &str) -> Result<(), StoreError> {
        let connection = self.acquire()?;
        let result = block_on_with_runtime(&self.runtime, async {
            connection
                .client
                .batch_execute(sql)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))
        });
        self.release(connection, result.is_ok());
        result
    }

    /// Takes a live connection from the pool, opening one when needed.
    fn acquire(&self) -> Result<PooledConnection, StoreError> {
        let recycle_after = Duration::from_secs(self.settings.recycle_seconds);
        loop {
            let candidate = {
                let mut idle = self
                    .idle
                    .lock()
                    .map_err(|_| StoreError::Backend("pool mutex poisoned".to_owned()))?;
                idle.pop()
            };
            let Some(connection) = candidate else { break };
            if connection.opened_at.elapsed() >= recycle_after {
                tracing::debug!("retiring pooled connection past recycle age");
                continue;
            }
            if self.settings.pre_ping && !self.ping(&connection) {
                tracing::debug!("dropping dead pooled connection");
                continue;
            }
            return Ok(connection);
        }
        self.connect()
    }

    /// Returns a connection to the pool after successful use.
    fn release(&self, connection: PooledConnection, healthy: bool) {
        if !healthy {
            return;
        }
        if let Ok(mut idle) = self.idle.lock()
            && idle.len() < self.settings.pool_size
        {
            idle.push(connection);
        }
    }

    /// Verifies a pooled connection is still alive.
    fn ping(&self, connection: &PooledConnection) -> bool {
        block_on_with_runtime(&self.runtime, async {
            connection
                .client
                .simple_query("SELECT 1")
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))
        })
        .is_ok()
    }

    /// Opens a new physical connection per the configured auth mode.
    fn connect(&self) -> Result<PooledConnection, StoreError> {
        match &self.connector {
            Connector::Password { url } => {
                let mut config: tokio_postgres::Config = url
                    .parse()
                    .map_err(|err: tokio_postgres::Error| StoreError::Backend(err.to_string()))?;
                config.connect_timeout(CONNECT_TIMEOUT);
                self.open(config, false)
            }
            Connector::Iam { settings, minter } => {
                // A fresh token per connection; never logged.
                let token = minter.mint_token(settings)?;
                let mut config = tokio_postgres::Config::new();
                config
                    .host(&settings.host)
                    .port(settings.port)
                    .dbname(&settings.database)
                    .user(&settings.user)
                    .password(token)
                    .connect_timeout(CONNECT_TIMEOUT);
                self.open(config, true)
            }
        }
    }

    /// Establishes the connection and spawns its driver task.
    fn open(&self, config: tokio_postgres::Config, require_tls: bool) -> Result<PooledConnection, StoreError> {
        let runtime = Arc::clone(&self.runtime);
        if require_tls {
            let tls = tls_connector()?;
            let client = block_on_with_runtime(&self.runtime, async move {
                let (client, connection) = config
                    .connect(tls)
                    .await
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
                runtime.spawn(async move {
                    if let Err(err) = connection.await {
                        tracing::warn!(error = %err, "database connection terminated");
                    }
                });
                Ok(client)
            })?;
            return Ok(PooledConnection {
                client,
                opened_at: Instant::now(),
            });
        }
        let client = block_on_with_runtime(&self.runtime, async move {
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            runtime.spawn(async move {
                if let Err(err) = connection.await {
                    tracing::warn!(error = %err, "database connection terminated");
                }
            });
            Ok(client)
        })?;
        Ok(PooledConnection {
            client,
            opened_at: Instant::now(),
        })
    }
}

/// Builds the pool's owned multi-thread runtime.
fn build_runtime() -> Result<Arc<Runtime>, StoreError> {
    Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("epx-store")
        .build()
        .map(Arc::new)
        .map_err(|err| StoreError::Backend(err.to_string()))
}

/// Builds a TLS connector trusting the platform root store.
fn tls_connector() -> Result<MakeRustlsConnect, StoreError> {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        if let Err(err) = roots.add(cert) {
            tracing::warn!(error = %err, "skipping unparseable platform root certificate");
        }
    }
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps a `jobs` row onto the domain entity.
fn job_from_row(row: &Row) -> Result<Job, StoreError> {
    let status_raw: String = row.get("status");
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown job status {status_raw:?}")))?;
    let tags_raw: String = row.get("tags");
    let tags = serde_json::from_str(&tags_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad tags payload: {err}")))?;
    let metadata_raw: String = row.get("job_metadata");
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad metadata payload: {err}")))?;
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");
    Ok(Job {
        id: Some(row.get("id")),
        user_id: row.get("user_id"),
        tags,
        status,
        created_at: timefmt::parse_utc(&created_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        updated_at: timefmt::parse_utc(&updated_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        input_location: row.get("input_location"),
        config_location: row.get("config_location"),
        metadata,
    })
}

/// Maps a `runs` row onto the domain entity.
fn run_from_row(row: &Row) -> Result<Run, StoreError> {
    let status_raw: String = row.get("status");
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown run status {status_raw:?}")))?;
    let phase_raw: String = row.get("pod_phase");
    let pod_phase = PodPhase::parse(&phase_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown pod phase {phase_raw:?}")))?;
    let request_raw: String = row.get("request");
    let request = serde_json::from_str(&request_raw)
        .map_err(|err| StoreError::Corrupt(format!("bad request payload: {err}")))?;
    let created_raw: String = row.get("created_at");
    let updated_raw: String = row.get("updated_at");
    let uploaded_raw: Option<String> = row.get("results_uploaded_at");
    let results_uploaded_at = uploaded_raw
        .map(|raw| timefmt::parse_utc(&raw).map_err(|err| StoreError::Corrupt(err.to_string())))
        .transpose()?;
    let user_deleted: i64 = row.get("user_deleted");
    Ok(Run {
        id: Some(row.get("id")),
        job_id: row.get("job_id"),
        user_id: row.get("user_id"),
        request,
        status,
        pod_phase,
        container_status: row.get("container_status"),
        epx_client_version: row.get("epx_client_version"),
        config_url: row.get("config_url"),
        results_url: row.get("results_url"),
        results_uploaded_at,
        batch_executor_id: row.get("batch_executor_id"),
        user_deleted: user_deleted != 0,
        created_at: timefmt::parse_utc(&created_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        updated_at: timefmt::parse_utc(&updated_raw)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
    })
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// PostgreSQL-backed store implementing both repositories.
pub struct PgStore {
    /// Connection pool.
    pool: PgPool,
}

impl PgStore {
    /// Creates the store and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema bootstrap fails.
    pub fn new(pool: PgPool) -> Result<Self, StoreError> {
        pool.batch_execute(SCHEMA_SQL)?;
        Ok(Self { pool })
    }
}

impl JobRepository for PgStore {
    fn save(&self, job: &Job) -> Result<Job, StoreError> {
        let tags = serde_json::to_string(&job.tags)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let metadata = serde_json::to_string(&job.metadata)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let created = timefmt::format_utc(job.created_at);
        let updated = timefmt::format_utc(job.updated_at);
        if let Some(id) = job.id {
            self.pool.execute(
                "INSERT INTO jobs (id, user_id, tags, status, created_at, updated_at,
                                   input_location, config_location, job_metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (id) DO UPDATE SET
                     user_id = EXCLUDED.user_id,
                     tags = EXCLUDED.tags,
                     status = EXCLUDED.status,
                     created_at = EXCLUDED.created_at,
                     updated_at = EXCLUDED.updated_at,
                     input_location = EXCLUDED.input_location,
                     config_location = EXCLUDED.config_location,
                     job_metadata = EXCLUDED.job_metadata",
                &[
                    &id,
                    &job.user_id,
                    &tags,
                    &job.status.as_str(),
                    &created,
                    &updated,
                    &job.input_location,
                    &job.config_location,
                    &metadata,
                ],
            )?;
            let mut persisted = job.clone();
            persisted.id = Some(id);
            return Ok(persisted);
        }
        let rows = self.pool.query(
            "INSERT INTO jobs (user_id, tags, status, created_at, updated_at,
                               input_location, config_location, job_metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
            &[
                &job.user_id,
                &tags,
                &job.status.as_str(),
                &created,
                &updated,
                &job.input_location,
                &job.config_location,
                &metadata,
            ],
        )?;
        let id: i64 = rows
            .first()
            .ok_or_else(|| StoreError::Backend("insert returned no id".to_owned()))?
            .get("id");
        let mut persisted = job.clone();
        persisted.id = Some(id);
        Ok(persisted)
    }

    fn find_by_id(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let rows = self.pool.query("SELECT * FROM jobs WHERE id = $1", &[&job_id])?;
        rows.first().map(job_from_row).transpose()
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        let rows = self
            .pool
            .query("SELECT * FROM jobs WHERE user_id = $1 ORDER BY id", &[&user_id])?;
        rows.iter().map(job_from_row).collect()
    }

    fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let rows = self
            .pool
            .query("SELECT * FROM jobs WHERE status = $1 ORDER BY id", &[&status.as_str()])?;
        rows.iter().map(job_from_row).collect()
    }

    fn find_all(&self, limit: Option<u64>, offset: u64) -> Result<Vec<Job>, StoreError> {
        let limit_value = limit.map_or(i64::MAX, |value| i64::try_from(value).unwrap_or(i64::MAX));
        let offset_value = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = self.pool.query(
            "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            &[&limit_value, &offset_value],
        )?;
        rows.iter().map(job_from_row).collect()
    }

    fn exists(&self, job_id: i64) -> Result<bool, StoreError> {
        let rows = self
            .pool
            .query("SELECT COUNT(*) AS n FROM jobs WHERE id = $1", &[&job_id])?;
        let count: i64 = rows
            .first()
            .ok_or_else(|| StoreError::Backend("count returned no row".to_owned()))?
            .get("n");
        Ok(count > 0)
    }

    fn delete(&self, job_id: i64) -> Result<bool, StoreError> {
        let affected = self.pool.execute("DELETE FROM jobs WHERE id = $1", &[&job_id])?;
        Ok(affected > 0)
    }
}

impl RunRepository for PgStore {
    fn save(&self, run: &Run) -> Result<Run, StoreError> {
        let request = serde_json::to_string(&run.request)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let created = timefmt::format_utc(run.created_at);
        let updated = timefmt::format_utc(run.updated_at);
        let uploaded = run.results_uploaded_at.map(timefmt::format_utc);
        let user_deleted = i64::from(run.user_deleted);
        if let Some(id) = run.id {
            self.pool.execute(
                "INSERT INTO runs (id, job_id, user_id, request, status, pod_phase,
                                   container_status, epx_client_version, config_url, results_url,
                                   results_uploaded_at, batch_executor_id, user_deleted,
                                   created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                 ON CONFLICT (id) DO UPDATE SET
                     job_id = EXCLUDED.job_id,
                     user_id = EXCLUDED.user_id,
                     request = EXCLUDED.request,
                     status = EXCLUDED.status,
                     pod_phase = EXCLUDED.pod_phase,
                     container_status = EXCLUDED.container_status,
                     epx_client_version = EXCLUDED.epx_client_version,
                     config_url = EXCLUDED.config_url,
                     results_url = EXCLUDED.results_url,
                     results_uploaded_at = EXCLUDED.results_uploaded_at,
                     batch_executor_id = EXCLUDED.batch_executor_id,
                     user_deleted = EXCLUDED.user_deleted,
                     created_at = EXCLUDED.created_at,
                     updated_at = EXCLUDED.updated_at",
                &[
                    &id,
                    &run.job_id,
                    &run.user_id,
                    &request,
                    &run.status.as_str(),
                    &run.pod_phase.as_str(),
                    &run.container_status,
                    &run.epx_client_version,
                    &run.config_url,
                    &run.results_url,
                    &uploaded,
                    &run.batch_executor_id,
                    &user_deleted,
                    &created,
                    &updated,
                ],
            )?;
            let mut persisted = run.clone();
            persisted.id = Some(id);
            return Ok(persisted);
        }
        let rows = self.pool.query(
            "INSERT INTO runs (job_id, user_id, request, status, pod_phase, container_status,
                               epx_client_version, config_url, results_url, results_uploaded_at,
                               batch_executor_id, user_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING id",
            &[
                &run.job_id,
                &run.user_id,
                &request,
                &run.status.as_str(),
                &run.pod_phase.as_str(),
                &run.container_status,
                &run.epx_client_version,
                &run.config_url,
                &run.results_url,
                &uploaded,
                &run.batch_executor_id,
                &user_deleted,
                &created,
                &updated,
            ],
        )?;
        let id: i64 = rows
            .first()
            .ok_or_else(|| StoreError::Backend("insert returned no id".to_owned()))?
            .get("id");
        let mut persisted = run.clone();
        persisted.id = Some(id);
        Ok(persisted)
    }

    fn find_by_id(&self, run_id: i64) -> Result<Option<Run>, StoreError> {
        let rows = self.pool.query("SELECT * FROM runs WHERE id = $1", &[&run_id])?;
        rows.first().map(run_from_row).transpose()
    }

    fn find_by_job_id(&self, job_id: i64) -> Result<Vec<Run>, StoreError> {
        let rows = self
            .pool
            .query("SELECT * FROM runs WHERE job_id = $1 ORDER BY id", &[&job_id])?;
        rows.iter().map(run_from_row).collect()
    }

    fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Run>, StoreError> {
        let rows = self
            .pool
            .query("SELECT * FROM runs WHERE user_id = $1 ORDER BY id", &[&user_id])?;
        rows.iter().map(run_from_row).collect()
    }

    fn find_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let aliases: Vec<String> = ALL_RUN_STATUSES
            .iter()
            .filter(|candidate| candidate.canonically_eq(status))
            .map(|candidate| candidate.as_str().to_owned())
            .collect();
        let rows = self.pool.query(
            "SELECT * FROM runs WHERE status = ANY($1) ORDER BY id",
            &[&aliases],
        )?;
        rows.iter().map(run_from_row).collect()
    }

    fn exists(&self, run_id: i64) -> Result<bool, StoreError> {
        let rows = self
            .pool
            .query("SELECT COUNT(*) AS n FROM runs WHERE id = $1", &[&run_id])?;
        let count: i64 = rows
            .first()
            .ok_or_else(|| StoreError::Backend("count returned no row".to_owned()))?
            .get("n");
        Ok(count > 0)
    }

    fn delete(&self, run_id: i64) -> Result<bool, StoreError> {
        let affected = self.pool.execute("DELETE FROM runs WHERE id = $1", &[&run_id])?;
        Ok(affected > 0)
    }
}
