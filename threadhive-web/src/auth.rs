//! Session authentication
//!
//! `CurrentUser` rejects anonymous requests with 401 before the handler body
//! runs, so no business check ever sees an unauthenticated actor.
//! `OptionalUser` never rejects.

pub mod credentials;
pub mod handlers;
pub mod session;
pub mod token;

#[cfg(test)]
mod tests;

pub use credentials::{CredentialVerifier, Credentials, NoCredentials};
pub use session::SessionResolver;
pub use token::{Claims, TokenError, TokenService};

use crate::{error::ApiError, AppState};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use threadhive_core::Identity;

/// Authenticated identity (401 otherwise)
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        app_state
            .sessions
            .resolve(&parts.headers)
            .await
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Optional user extractor - doesn't fail if user is not authenticated
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Identity>);

impl OptionalUser {
    pub fn id(&self) -> Option<threadhive_core::EntityId> {
        self.0.as_ref().map(|identity| identity.id)
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(OptionalUser(app_state.sessions.resolve(&parts.headers).await))
    }
}
