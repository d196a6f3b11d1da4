//! Application state for the API server

use std::sync::Arc;

use loyalty_engine::GamificationEngine;
use loyalty_store::LoyaltyStore;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// The assembled gamification engine
    pub engine: Arc<GamificationEngine>,
    /// API version
    pub version: String,
}

impl AppState {
    /// Create new app state over a storage backend
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self {
            engine: Arc::new(GamificationEngine::new(store)),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}
