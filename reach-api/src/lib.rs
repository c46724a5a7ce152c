//! # REACH API Server
//!
//! HTTP surface of the campaign delivery service.
//!
//! ## Endpoints
//!
//! - `GET /delivery?app_id=&country=&os=[&<dimension>=][&page=][&limit=]` - Eligible campaigns, `X-Cache: HIT|MISS`
//! - `GET /dimensions` - Dimensions used by any targeting rule
//! - `GET /dimensions/:dimension/values` - Values used for one dimension
//! - `GET /health` - Liveness, version, uptime
//! - `GET /stats` - Delivery counters and cache occupancy
//!
//! Errors are returned as `{"error": "<message>", "code": "ERR_<status>"}`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reach_api::{ApiConfig, ApiServer};
//!
//! let config = ApiConfig::from_env()?;
//! let addr = config.socket_addr()?;
//! let server = ApiServer::from_config(config).await?;
//! server.run(addr).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod middleware;
mod routes;
mod state;

pub use dto::{DimensionValuesResponse, DimensionsResponse, HealthResponse, StatsResponse};
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use reach_cache::CacheSweeper;
use reach_core::error::Result;

/// API server for REACH.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server around prepared state.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens the configured rule store and creates the server.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        Ok(Self::new(AppState::from_config(config).await?))
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
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

    /// Serves on `addr` until Ctrl-C, sweeping expired cache entries in the
    /// background.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let sweeper = CacheSweeper::spawn(
            self.state.service.cache().clone(),
            self.state.config.sweep_interval,
        );

        info!("REACH API server listening on {}", addr);

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        sweeper.stop().await;
        info!("REACH API server stopped");
        served
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Starts the API server with configuration from the environment.
pub async fn start_server() -> Result<()> {
    let config = ApiConfig::from_env()?;
    let addr = config.socket_addr()?;
    let server = ApiServer::from_config(config).await?;
    server.run(addr).await?;
    Ok(())
}
