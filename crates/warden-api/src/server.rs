//! HTTP server wrapper with graceful shutdown.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::routes::create_router;
use crate::state::ApiState;

/// The admin API server.
#[derive(Clone)]
pub struct ApiServer {
    state: ApiState,
}

impl ApiServer {
    /// Creates a server over the shared state.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        Self { state }
    }

    /// Returns the router without starting a listener. Useful for
    /// tests and embedding.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Serves until a fatal error.
    ///
    /// # Errors
    ///
    /// Fails when binding or serving fails.
    pub async fn serve(&self, addr: SocketAddr) -> ApiResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Resource(format!("failed to bind {addr}: {e}")))?;
        info!(addr = %addr, "admin API listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Serves until the shutdown future completes, draining in-flight
    /// requests.
    ///
    /// # Errors
    ///
    /// Fails when binding or serving fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Resource(format!("failed to bind {addr}: {e}")))?;
        info!(addr = %addr, "admin API listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        info!("admin API shut down");
        Ok(())
    }
}
