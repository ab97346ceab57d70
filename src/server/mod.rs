//! Optional HTTP admin API
//!
//! Exposes status, target management, on-demand checks and Prometheus
//! metrics over the same watch table the monitor and bot use.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::monitor::Monitor;
use api::create_router;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Monitor and its watch table
    pub monitor: Arc<Monitor>,

    /// Server start time
    pub start_time: Instant,
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Server error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Admin HTTP server
pub struct AdminServer {
    bind_address: SocketAddr,
    state: AppState,
}

impl AdminServer {
    pub fn new(bind_address: SocketAddr, monitor: Arc<Monitor>) -> Self {
        Self {
            bind_address,
            state: AppState {
                monitor,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(addr = %addr, "Admin API listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        tracing::info!("Admin API shutdown complete");
        Ok(())
    }
}
