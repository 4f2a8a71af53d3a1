use std::sync::Arc;

use crate::config::WebSocketConfig;
use crate::db::{HistoryStore, PatientStore, RecordSource};
use crate::orchestrator::Orchestrator;

/// Shared state handed to every handler and WebSocket session.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub patients: Arc<dyn PatientStore>,
    pub history: Arc<dyn HistoryStore>,
    pub websocket: WebSocketConfig,
    /// Model name reported by the chat health check.
    pub model: String,
    pub model_configured: bool,
}

impl AppState {
    pub fn records(&self) -> Arc<dyn RecordSource> {
        self.orchestrator.records()
    }
}
