//! Shared application state (C13): handed to every axum handler as an
//! `Arc<AppState>` extension.

use std::sync::Arc;

use parking_lot::RwLock;

use stt_gateway_config::Settings;
use stt_gateway_persistence::TranscriptStore;

use crate::registry::SessionRegistry;
use crate::session::RecognizerFactory;

pub struct AppState {
    /// Swappable by `/admin/reload-config` (§4.13); sessions already running
    /// keep the `Arc<Settings>` they were built with.
    settings: RwLock<Arc<Settings>>,
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn TranscriptStore>,
    pub recognizer_factory: RecognizerFactory,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn TranscriptStore>,
        recognizer_factory: RecognizerFactory,
        metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            registry: Arc::new(SessionRegistry::new()),
            store,
            recognizer_factory,
            metrics_handle,
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.read().clone()
    }

    /// Re-validates before swapping; the previous settings stay live on
    /// failure (§4.13).
    pub fn reload_settings(&self, new_settings: Settings) -> Result<(), stt_gateway_config::ConfigError> {
        new_settings.validate()?;
        *self.settings.write() = Arc::new(new_settings);
        Ok(())
    }
}
