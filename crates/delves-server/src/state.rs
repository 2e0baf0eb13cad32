//! Shared application state.

use std::sync::Arc;

use delves_instances::application::InstanceService;

use crate::host::LocalWorldHost;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The instance service.
    pub service: InstanceService,
    /// The in-memory host fed by the gameplay ingest routes.
    pub host: Arc<LocalWorldHost>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(service: InstanceService, host: Arc<LocalWorldHost>) -> Self {
        Self { service, host }
    }
}
