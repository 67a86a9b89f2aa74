use std::sync::Arc;
use std::time::Duration;

use easel_store::{open_store, TracingObserver};
use tokio::net::TcpListener;

use crate::auth::JwtAuth;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// easel HTTP server.
pub struct EaselServer {
    config: ServerConfig,
    state: AppState,
}

impl EaselServer {
    /// Validate `config`, open its store backend, and set up token auth.
    pub async fn open(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = open_store(&config.store, Arc::new(TracingObserver)).await?;
        let auth = JwtAuth::new(
            &config.jwt_secret,
            Duration::from_secs(config.token_ttl_secs),
        );
        Ok(Self::with_state(config, AppState::new(store, Arc::new(auth))))
    }

    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Serve until interrupted with ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            backend = self.config.store.backend.name(),
            "easel server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
