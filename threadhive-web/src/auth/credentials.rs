//! Credential checks behind `POST /auth/login`
//!
//! Password storage and hashing live outside this crate. The login handler
//! asks a `CredentialVerifier` who the credentials belong to and only issues
//! the session.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use threadhive_community::StoreError;
use threadhive_core::Identity;
use tracing::warn;

/// Email and password as submitted
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves credentials to the identity they belong to
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` when the credentials do not match any identity
    async fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, StoreError>;
}

/// Rejects every login. Used until a real verifier is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialVerifier for NoCredentials {
    async fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, StoreError> {
        warn!(email = %credentials.email, "Login attempted with no credential verifier installed");
        Ok(None)
    }
}
