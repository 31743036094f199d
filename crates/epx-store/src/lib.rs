// epx-store/src/lib.rs
// ============================================================================
// Module: EPX Store Library
// Description: Relational repository backends for the control plane.
// Purpose: Select and construct the repository backend from configuration.
// Dependencies: epx-config, epx-core, crate::{sqlite, postgres}
// ============================================================================

//! ## Overview
//! Two repository backends implement the kernel's `JobRepository` and
//! `RunRepository` traits: a `SQLite` store (WAL journal, shared connection)
//! for local runs and tests, and a PostgreSQL store behind a small recycling
//! pool supporting both static-password and short-lived-token
//! authentication. [`open_stores`] maps a resolved [`DatabaseConfig`] onto
//! the right backend.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod postgres;
pub mod sqlite;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use epx_config::DatabaseConfig;
use epx_core::JobRepository;
use epx_core::RunRepository;
use epx_core::StoreError;

use crate::postgres::PgPool;
use crate::postgres::PgStore;
use crate::sqlite::SqliteStore;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use postgres::DbTokenMinter;
pub use postgres::ExecTokenMinter;

// ============================================================================
// SECTION: Backend Selection
// ============================================================================

/// Repository handles for one configured backend.
#[derive(Clone)]
pub struct Stores {
    /// Job repository.
    pub jobs: Arc<dyn JobRepository>,
    /// Run repository.
    pub runs: Arc<dyn RunRepository>,
}

/// Opens the repository backend described by `config`.
///
/// The short-lived-token mode needs a [`DbTokenMinter`]; pass the deployment
/// platform's minter, or `None` to reject IAM configurations.
///
/// # Errors
///
/// Returns [`StoreError`] when the backend cannot be opened or bootstrapped.
pub fn open_stores(
    config: &DatabaseConfig,
    token_minter: Option<Arc<dyn DbTokenMinter>>,
) -> Result<Stores, StoreError> {
    match config {
        DatabaseConfig::Sqlite { path } => {
            let store = Arc::new(SqliteStore::open(path)?);
            Ok(Stores {
                jobs: Arc::clone(&store) as Arc<dyn JobRepository>,
                runs: store,
            })
        }
        DatabaseConfig::Postgres { url, pool } => {
            let pool = PgPool::with_password(url, pool.clone())?;
            let store = Arc::new(PgStore::new(pool)?);
            Ok(Stores {
                jobs: Arc::clone(&store) as Arc<dyn JobRepository>,
                runs: store,
            })
        }
        DatabaseConfig::PostgresIam(settings) => {
            let minter = token_minter.ok_or_else(|| {
                StoreError::Backend(
                    "IAM database authentication requires a token minter".to_owned(),
                )
            })?;
            let pool = PgPool::with_iam_tokens(settings.clone(), minter)?;
            let store = Arc::new(PgStore::new(pool)?);
            Ok(Stores {
                jobs: Arc::clone(&store) as Arc<dyn JobRepository>,
                runs: store,
            })
        }
    }
}
