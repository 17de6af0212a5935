//! Session Resolver
//!
//! Turns an incoming request into an identity or nothing. Every failure
//! (missing cookie, bad signature, expiry, unknown subject, store error)
//! collapses to `None`; the cause is only logged.

use super::token::TokenService;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use threadhive_community::CommunityStore;
use threadhive_core::Identity;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SessionResolver {
    tokens: Arc<TokenService>,
    store: Arc<dyn CommunityStore>,
}

impl SessionResolver {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn CommunityStore>) -> Self {
        Self { tokens, store }
    }

    /// Resolve from raw request headers
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        self.resolve_jar(&CookieJar::from_headers(headers)).await
    }

    /// Resolve from an already parsed cookie jar
    pub async fn resolve_jar(&self, jar: &CookieJar) -> Option<Identity> {
        let token = self.tokens.token_from(jar)?;

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(cause = %e, "Ignoring session token");
                return None;
            }
        };

        let Some(id) = claims.subject_id() else {
            debug!(subject = %claims.sub, "Session subject is not an identity key");
            return None;
        };

        match self.store.find_identity(id).await {
            Ok(Some(identity)) => Some(identity),
            Ok(None) => {
                debug!(subject = %id, "Session subject no longer exists");
                None
            }
            Err(e) => {
                warn!(subject = %id, error = %e, "Identity lookup failed during session resolution");
                None
            }
        }
    }
}
