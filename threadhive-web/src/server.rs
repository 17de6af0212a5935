//! Threadhive Web Server
//!
//! Main web server implementation using Axum.

use crate::auth::CredentialVerifier;
use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use std::sync::Arc;
use threadhive_core::ThreadhiveConfig;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Threadhive web server
pub struct ThreadhiveServer {
    config: ThreadhiveConfig,
    state: AppState,
}

impl ThreadhiveServer {
    /// Validate the configuration and build the application state
    pub async fn new(config: ThreadhiveConfig) -> WebResult<Self> {
        config.validate()?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Serve until Ctrl-C. In-flight requests are dropped on shutdown and any
    /// open store transaction rolls back with them.
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting Threadhive Web Server");
        info!("Server address: http://{}", address);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &ThreadhiveConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for ThreadhiveServer
pub struct ThreadhiveServerBuilder {
    config: ThreadhiveConfig,
    credentials: Option<Arc<dyn CredentialVerifier>>,
}

impl ThreadhiveServerBuilder {
    /// Start from defaults
    pub fn new() -> Self {
        Self {
            config: ThreadhiveConfig::default(),
            credentials: None,
        }
    }

    /// Start from an already loaded configuration
    pub fn with_config(config: ThreadhiveConfig) -> Self {
        Self {
            config,
            credentials: None,
        }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.server.database_url = database_url.into();
        self
    }

    /// Set the session signing secret
    pub fn session_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.config.session.secret = Some(secret.into());
        self
    }

    /// Set the verifier behind `POST /auth/login`
    pub fn credentials(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = Some(verifier);
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<ThreadhiveServer> {
        let mut server = ThreadhiveServer::new(self.config).await?;
        if let Some(verifier) = self.credentials {
            server.state = server.state.with_credentials(verifier);
        }
        Ok(server)
    }
}

impl Default for ThreadhiveServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
