//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ApiConfig;
use crate::engine::EngineHandle;
use crate::websocket::{ConnectionHub, HubConfig};

#[derive(Clone)]
pub struct AppState {
    /// Handle to the engine task that owns tracker state
    pub engine: EngineHandle,
    /// WebSocket connection hub for dashboard streaming
    pub hub: Arc<ConnectionHub>,
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state with a fresh hub sized from the config
    pub fn new(engine: EngineHandle, config: ApiConfig) -> Self {
        let hub = Arc::new(ConnectionHub::new(HubConfig {
            max_connections: config.max_ws_connections,
        }));
        Self::with_hub(engine, hub, config)
    }

    /// Create state around an existing hub (already relaying view effects)
    pub fn with_hub(engine: EngineHandle, hub: Arc<ConnectionHub>, config: ApiConfig) -> Self {
        Self {
            engine,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.hub.connection_count().await
    }
}
