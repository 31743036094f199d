// epx-server/src/state.rs
// ============================================================================
// Module: EPX Server State
// Description: Shared request-handler state.
// Purpose: Hold the controller facade handlers dispatch through.
// Dependencies: epx-core
// ============================================================================

//! ## Overview
//! One [`AppState`] is built at startup and shared across workers. It owns
//! nothing but the controller; per-request state does not exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use epx_core::JobController;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Controller facade over the configured backends.
    pub controller: Arc<JobController>,
}

impl AppState {
    /// Wraps a controller for router construction.
    #[must_use]
    pub fn new(controller: Arc<JobController>) -> Self {
        Self { controller }
    }
}
