// epx-config/src/database.rs
// ============================================================================
// Module: EPX Database Config
// Description: Relational store connection settings and auth mode selection.
// Purpose: Build the connection URL from the environment and model the
//          short-lived-token authentication flow.
// Dependencies: thiserror, url
// ============================================================================

//! ## Overview
//! Three authentication modes are supported, mirroring the deployment
//! surface: short-lived-token (IAM) authentication (`USE_IAM_AUTH=true`),
//! static-password URLs (`DATABASE_URL` or the `DATABASE_HOST/PORT/NAME/
//! USER/PASSWORD` component set, assembled with URL-encoded credentials), and
//! local SQLite files. The token mode never carries a password in the URL: a
//! fresh token is minted per new physical connection, the pool recycles
//! connections strictly before token expiry, and TLS is required.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use url::Url;

use crate::app::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default PostgreSQL port.
const DEFAULT_POSTGRES_PORT: u16 = 5432;
/// Default pool size.
const DEFAULT_POOL_SIZE: usize = 10;
/// Default connection recycle interval (seconds).
const DEFAULT_RECYCLE_SECONDS: u64 = 600;
/// Lifetime of a minted auth token (seconds).
const TOKEN_LIFETIME_SECONDS: u64 = 900;
/// Default SQLite database file.
const DEFAULT_SQLITE_PATH: &str = "epx_jobs.db";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Database configuration failures.
#[derive(Debug, Error)]
pub enum DatabaseConfigError {
    /// General configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The assembled or provided URL does not parse.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    /// Pool settings violate the token lifetime bound.
    #[error("pool recycle interval ({recycle_seconds}s) must be strictly below the token lifetime ({token_lifetime_seconds}s)")]
    RecycleTooLong {
        /// Configured recycle interval.
        recycle_seconds: u64,
        /// Token lifetime the interval must stay below.
        token_lifetime_seconds: u64,
    },
}

// ============================================================================
// SECTION: Pool Settings
// ============================================================================

/// Connection pool tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Age at which a pooled connection is retired (seconds).
    pub recycle_seconds: u64,
    /// Whether liveness is verified before lending a connection.
    pub pre_ping: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            recycle_seconds: DEFAULT_RECYCLE_SECONDS,
            pre_ping: true,
        }
    }
}

// ============================================================================
// SECTION: IAM Settings
// ============================================================================

/// Short-lived-token authentication settings.
///
/// # Invariants
/// - `pool.recycle_seconds < token_lifetime_seconds`, so no pooled connection
///   outlives the token that opened it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamAuthSettings {
    /// Database endpoint hostname.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Token-authenticated database user.
    pub user: String,
    /// Region tokens are minted in.
    pub region: String,
    /// Pool tuning.
    pub pool: PoolSettings,
    /// Token validity window (seconds).
    pub token_lifetime_seconds: u64,
}

// ============================================================================
// SECTION: Database Config
// ============================================================================

/// Resolved database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    /// Local SQLite file.
    Sqlite {
        /// Database file path (`:memory:` supported).
        path: String,
    },
    /// PostgreSQL with static-password credentials embedded in the URL.
    Postgres {
        /// Full connection URL.
        url: String,
        /// Pool tuning.
        pool: PoolSettings,
    },
    /// PostgreSQL with per-connection minted tokens.
    PostgresIam(IamAuthSettings),
}

impl DatabaseConfig {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseConfigError`] when required variables are missing or
    /// the settings are inconsistent.
    pub fn from_env() -> Result<Self, DatabaseConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Resolves the configuration through an environment lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseConfigError`] when required variables are missing or
    /// the settings are inconsistent.
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, DatabaseConfigError> {
        if env("USE_IAM_AUTH").as_deref() == Some("true") {
            return Self::iam_from_lookup(env);
        }

        let url = match env("DATABASE_URL") {
            Some(url) => url,
            None => match Self::url_from_components(env)? {
                Some(url) => url,
                None => return Ok(Self::Sqlite {
                    path: DEFAULT_SQLITE_PATH.to_owned(),
                }),
            },
        };
        Self::from_url(&url)
    }

    /// Classifies an explicit connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseConfigError::InvalidUrl`] for unparseable URLs.
    pub fn from_url(raw: &str) -> Result<Self, DatabaseConfigError> {
        // Legacy scheme used by older deployment manifests.
        let normalized = raw
            .strip_prefix("postgres://")
            .map_or_else(|| raw.to_owned(), |rest| format!("postgresql://{rest}"));

        if let Some(path) = normalized.strip_prefix("sqlite:///") {
            return Ok(Self::Sqlite {
                path: path.to_owned(),
            });
        }
        if let Some(path) = normalized.strip_prefix("sqlite://") {
            return Ok(Self::Sqlite {
                path: path.to_owned(),
            });
        }
        if normalized.starts_with("postgresql://") {
            Url::parse(&normalized).map_err(|err| DatabaseConfigError::InvalidUrl(err.to_string()))?;
            return Ok(Self::Postgres {
                url: normalized,
                pool: PoolSettings::default(),
            });
        }
        // Bare paths are treated as SQLite files.
        Ok(Self::Sqlite { path: normalized })
    }

    /// Assembles a static-password URL from component variables, URL-encoding
    /// the credentials.
    fn url_from_components(
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Option<String>, DatabaseConfigError> {
        let Some(host) = env("DATABASE_HOST") else {
            return Ok(None);
        };
        let name = env("DATABASE_NAME").ok_or(ConfigError::MissingVariable("DATABASE_NAME"))?;
        let user = env("DATABASE_USER").ok_or(ConfigError::MissingVariable("DATABASE_USER"))?;
        let password = env("DATABASE_PASSWORD").ok_or(ConfigError::MissingVariable("DATABASE_PASSWORD"))?;
        let port = parse_port(env("DATABASE_PORT"))?;

        let mut url = Url::parse(&format!("postgresql://{host}/{name}"))
            .map_err(|err| DatabaseConfigError::InvalidUrl(err.to_string()))?;
        url.set_port(Some(port))
            .map_err(|()| DatabaseConfigError::InvalidUrl("cannot set port".to_owned()))?;
        url.set_username(&user)
            .map_err(|()| DatabaseConfigError::InvalidUrl("cannot set username".to_owned()))?;
        url.set_password(Some(&password))
            .map_err(|()| DatabaseConfigError::InvalidUrl("cannot set password".to_owned()))?;
        Ok(Some(url.to_string()))
    }

    /// Resolves the short-lived-token mode, validating its variable set.
    fn iam_from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, DatabaseConfigError> {
        let host = env("DATABASE_HOST").ok_or(ConfigError::MissingVariable("DATABASE_HOST"))?;
        let database = env("DATABASE_NAME").ok_or(ConfigError::MissingVariable("DATABASE_NAME"))?;
        let user = env("DATABASE_IAM_USER").ok_or(ConfigError::MissingVariable("DATABASE_IAM_USER"))?;
        let port = parse_port(env("DATABASE_PORT"))?;
        let region = env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_owned());

        let settings = IamAuthSettings {
            host,
            port,
            database,
            user,
            region,
            pool: PoolSettings::default(),
            token_lifetime_seconds: TOKEN_LIFETIME_SECONDS,
        };
        if settings.pool.recycle_seconds >= settings.token_lifetime_seconds {
            return Err(DatabaseConfigError::RecycleTooLong {
                recycle_seconds: settings.pool.recycle_seconds,
                token_lifetime_seconds: settings.token_lifetime_seconds,
            });
        }
        Ok(Self::PostgresIam(settings))
    }
}

/// Parses an optional port variable, defaulting to the PostgreSQL port.
fn parse_port(raw: Option<String>) -> Result<u16, DatabaseConfigError> {
    match raw {
        Some(value) => value.parse::<u16>().map_err(|err| {
            DatabaseConfigError::Config(ConfigError::InvalidValue {
                variable: "DATABASE_PORT",
                reason: err.to_string(),
            })
        }),
        None => Ok(DEFAULT_POSTGRES_PORT),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
