use std::sync::Arc;

use hvac_events::EventBus;

use crate::config::ServerConfig;
use crate::pipeline::{CompletionLedger, JobRegistry};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT secret, pipeline settings).
    pub config: Arc<ServerConfig>,
    /// Live pipeline jobs keyed by project id.
    pub jobs: Arc<JobRegistry>,
    /// Completion flags keyed by `uuid_planId`.
    pub ledger: Arc<CompletionLedger>,
    /// Pipeline lifecycle events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Build the state and its pipeline services from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let jobs = Arc::new(JobRegistry::new(
            config.pipeline.clone(),
            Arc::clone(&event_bus),
        ));

        Self {
            config: Arc::new(config),
            jobs,
            ledger: Arc::new(CompletionLedger::new()),
            event_bus,
        }
    }
}
