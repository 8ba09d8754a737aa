//! Shared server state, mirroring the teacher's `SharedGateway` pattern:
//! an `Arc<Mutex<...>>` around the single long-lived component every
//! handler needs, cloneable cheaply into axum's `State` extractor.

use std::sync::Arc;
use tokio::sync::Mutex;
use voyager_core::orchestrator::Orchestrator;

/// Thread-safe shared orchestrator reference for axum handlers.
#[derive(Clone)]
pub struct SharedState(Arc<Mutex<Orchestrator>>);

impl SharedState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self(Arc::new(Mutex::new(orchestrator)))
    }

    pub fn orchestrator(&self) -> &Arc<Mutex<Orchestrator>> {
        &self.0
    }
}
