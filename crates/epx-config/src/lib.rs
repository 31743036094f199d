// epx-config/src/lib.rs
// ============================================================================
// Module: EPX Config Library
// Description: Environment-driven configuration for the control plane.
// Purpose: Resolve deployment settings once at startup, validated and typed.
// Dependencies: crate::{app, database}
// ============================================================================

//! ## Overview
//! Configuration is resolved from the process environment at startup into
//! typed structs: [`AppConfig`] for the service surface (bind address,
//! object-store bucket and region, gateway selection, batch queue and
//! definition) and [`DatabaseConfig`] for the relational store, including the
//! short-lived-token authentication mode. Every resolver accepts an
//! environment lookup function so tests never mutate process globals.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod app;
pub mod database;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use app::AppConfig;
pub use app::BatchConfig;
pub use app::ConfigError;
pub use app::Environment;
pub use database::DatabaseConfig;
pub use database::DatabaseConfigError;
pub use database::IamAuthSettings;
pub use database::PoolSettings;
