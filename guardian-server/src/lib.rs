//! Shared state and HTTP/WebSocket router for the Guardian ingest
//! server.
//!
//! Routes:
//! - `GET /ws/ingest/{child_hash}` — streaming ingest, credential in
//!   the connection target
//! - `GET /ws/ingest-auth` — streaming ingest with the auth handshake
//! - `POST /api/ingest` — synchronous fallback for devices that cannot
//!   keep a connection open

mod fallback;
mod ws;

use axum::routing::{get, post};
use axum::Router;
use guardian_ingest::{IdentityResolver, IngestionCoordinator, StorageGateway};
use std::sync::Arc;
use std::time::Duration;

pub use fallback::{IngestResponse, SectionOutcome};

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Confirms device credentials. Consulted once per connection,
    /// handshake, or fallback request — never cached across calls.
    pub resolver: Arc<dyn IdentityResolver>,
    /// Serializes writes per (device, kind) and talks to storage.
    pub coordinator: Arc<IngestionCoordinator>,
    /// How long the handshake path waits for the auth frame.
    pub auth_timeout: Duration,
}

impl AppState {
    /// Builds state with a default 30-second auth timeout.
    pub fn new(resolver: Arc<dyn IdentityResolver>, gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            resolver,
            coordinator: Arc::new(IngestionCoordinator::new(gateway)),
            auth_timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the handshake timeout.
    #[must_use]
    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }
}

/// Build the ingest router with the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/ingest/{child_hash}", get(ws::ingest_ws))
        .route("/ws/ingest-auth", get(ws::ingest_auth_ws))
        .route("/api/ingest", post(fallback::api_ingest))
        .with_state(state)
}
