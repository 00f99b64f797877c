//! Upload server: one form, one conversion per request.

pub mod routes;

use crate::config::SlideshowConfig;
use crate::error::SlideshowError;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default request body limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Where and how the server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared, read-only state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<SlideshowConfig>,
}

impl AppState {
    pub fn new(config: SlideshowConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Build the router with all routes and middleware.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(routes::index).post(routes::upload))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(server: ServerConfig, config: SlideshowConfig) -> Result<(), SlideshowError> {
    let addr: SocketAddr = server
        .address()
        .parse()
        .map_err(|e| SlideshowError::InvalidConfig(format!("Invalid address: {}", e)))?;

    let app = router(AppState::new(config), server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SlideshowError::InvalidConfig(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| SlideshowError::Internal(format!("Server error: {}", e)))
}
