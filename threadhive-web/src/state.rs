//! Application state shared by every request
//!
//! Built once at start-up: one store handle (one SQLite pool), one token
//! service, and the services that borrow them. Logins are refused until a
//! credential verifier is installed.

use crate::auth::{CredentialVerifier, NoCredentials, SessionResolver, TokenService};
use crate::{WebError, WebResult};
use std::sync::Arc;
use threadhive_community::{
    CommunityStore, ListingService, MembershipService, SqliteCommunityStore,
};
use threadhive_core::ThreadhiveConfig;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ThreadhiveConfig>,
    pub store: Arc<dyn CommunityStore>,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub sessions: SessionResolver,
    pub membership: MembershipService,
    pub listing: ListingService,
}

impl AppState {
    /// Connect the configured database and assemble the services
    pub async fn new(config: ThreadhiveConfig) -> WebResult<Self> {
        let store = SqliteCommunityStore::connect(&config.server.database_url)
            .await
            .map_err(|e| WebError::Database(e.to_string()))?;
        info!("Database initialized successfully");

        Self::with_store(config, Arc::new(store))
    }

    /// Assemble the services around an existing store
    pub fn with_store(config: ThreadhiveConfig, store: Arc<dyn CommunityStore>) -> WebResult<Self> {
        let tokens = Arc::new(TokenService::from_settings(&config.session)?);

        Ok(Self {
            sessions: SessionResolver::new(tokens.clone(), store.clone()),
            membership: MembershipService::new(store.clone()),
            listing: ListingService::new(store.clone()),
            config: Arc::new(config),
            store,
            tokens,
            credentials: Arc::new(NoCredentials),
        })
    }

    /// Install the verifier `POST /auth/login` checks credentials against
    pub fn with_credentials(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = verifier;
        self
    }
}
