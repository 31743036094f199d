// epx-server/src/lib.rs
// ============================================================================
// Module: EPX Server Library
// Description: HTTP framing for the control-plane kernel.
// Purpose: Expose the router and shared state for the binary and for tests.
// Dependencies: crate::{routes, state}
// ============================================================================

//! ## Overview
//! The server crate is framing only: routing, header validation, JSON
//! decode/encode, and status-code mapping. All behavior lives behind the
//! kernel's controller facade; no handler touches a repository or gateway
//! directly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod routes;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use routes::build_router;
pub use state::AppState;
