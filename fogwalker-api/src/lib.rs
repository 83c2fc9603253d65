//! # Fog Walker API Server
//!
//! Content endpoints for the four card variants, backed by a shared TTL cache
//! and an upstream text generator.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /content/cache` - Server cache statistics
//! - `GET /content/:variant?stream=<bool>` - Content for `sediment`, `wormhole`,
//!   `labelless` or `collider`; JSON envelope, or newline-delimited delivery
//!   frames when `stream=true`
//!
//! ## Example
//!
//! ```rust,ignore
//! use fogwalker_api::{ApiServer, ServerConfig};
//!
//! let server = ApiServer::new(ServerConfig::from_env())?;
//! server.run(([0, 0, 0, 0], 3000)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod encoder;
mod error;
mod handlers;
mod prompts;
mod routes;
mod state;

#[cfg(test)]
mod testing;

pub use encoder::DeliveryEncoder;
pub use error::ApiError;
pub use prompts::{PreparedRequest, COLLIDER_TOPICS};
pub use routes::create_router;
pub use state::{AppState, ServerConfig};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use fogwalker_core::Result;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server for Fog Walker.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server with the OpenAI-compatible upstream from `config`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self::with_state(AppState::new(config)?))
    }

    /// Creates a server around prepared state.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            %addr,
            upstream_configured = self.state.config.upstream.api_key.is_some(),
            cache_capacity = ?self.state.config.cache.max_entries,
            "Fog Walker API server listening"
        );

        axum::serve(listener, self.router()).await
    }
}
