//! HTTP/WebSocket server for live updates.
//!
//! The server:
//! - Upgrades `GET /ws` into the global scope
//! - Upgrades `GET /ws/:class_session_id` into that session's scope
//! - Reports registry occupancy on `GET /health`
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   LiveServer    │
//! │  (axum Router)  │
//! └───────┬─────────┘
//!         │ on_upgrade
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ serve_connection│────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Upgrade failures become HTTP 500 responses, never task panics

mod upgrade;

use std::net::SocketAddr;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::connection::ConnectionSettings;
use crate::registry::RegistryHandle;

/// Shared state for the upgrade handlers.
#[derive(Clone)]
pub struct LiveState {
    pub registry: RegistryHandle,
    pub settings: ConnectionSettings,
}

/// Builds the router serving the live endpoints.
pub fn live_router(state: LiveState) -> Router {
    Router::new()
        .route("/ws", get(upgrade::global_ws))
        .route("/ws/:class_session_id", get(upgrade::session_ws))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<LiveState>) -> Json<Value> {
    let stats = state.registry.stats().await;
    Json(json!({
        "status": "ok",
        "global": stats.global,
        "sessions": stats.sessions.len(),
        "connections": stats.connections,
    }))
}

/// HTTP/WebSocket server for the live-update endpoints.
pub struct LiveServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    settings: ConnectionSettings,
    cancel_token: CancellationToken,
}

impl LiveServer {
    pub fn new(
        addr: SocketAddr,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            addr,
            registry,
            settings,
            cancel_token,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.addr,
                error: e.to_string(),
            })?;
        self.serve(listener).await
    }

    /// Serves on an already-bound listener until cancelled.
    ///
    /// On cancellation every registered connection is closed before the
    /// listener stops.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().unwrap_or(self.addr);
        info!(addr = %local, "Live server listening");

        let router = live_router(LiveState {
            registry: self.registry.clone(),
            settings: self.settings,
        });

        let registry = self.registry;
        let cancel_token = self.cancel_token;
        let shutdown = async move {
            cancel_token.cancelled().await;
            info!("Server shutdown requested");
            let closed = registry.close_all().await;
            info!(closed, "Closed live connections");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        info!("Live server stopped");
        Ok(())
    }
}

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
