//! Session tokens: HS256 JWTs carried in an HTTP-only cookie

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use threadhive_core::{EntityId, SessionSettings};
use tracing::{debug, warn};

/// JWT signing and verification keys
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity id as a decimal string)
    pub sub: String,
    pub email: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    /// The subject as an identity key, if it is one
    pub fn subject_id(&self) -> Option<EntityId> {
        self.sub.parse().ok()
    }
}

/// Token errors. Only the service layer sees the distinction; requests
/// carrying a bad token are simply anonymous.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Session signing secret is not configured")]
    MissingSecret,
    #[error("Token creation failed")]
    Creation,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token expired")]
    Expired,
    #[error("Malformed token")]
    Malformed,
}

/// Issues, verifies and transports session tokens
pub struct TokenService {
    keys: Keys,
    validation: Validation,
    ttl: Duration,
    cookie_name: String,
    secure: bool,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build from session settings; an unset or empty secret is fatal
    pub fn from_settings(settings: &SessionSettings) -> Result<Self, TokenError> {
        let secret = settings
            .require_secret()
            .map_err(|_| TokenError::MissingSecret)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            keys: Keys::new(secret.as_bytes()),
            validation,
            ttl: settings.ttl(),
            cookie_name: settings.cookie_name.clone(),
            secure: settings.secure,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Sign a token for `subject` valid for the configured lifetime
    pub fn issue(&self, subject: EntityId, email: &str) -> Result<String, TokenError> {
        self.issue_at(subject, email, Utc::now().timestamp())
    }

    /// Sign a token as if issued at `issued_at` (unix seconds)
    pub fn issue_at(
        &self,
        subject: EntityId,
        email: &str,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs() as i64),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding).map_err(|e| {
            warn!("Failed to encode session token: {}", e);
            TokenError::Creation
        })
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token verification failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    _ => TokenError::Malformed,
                }
            })
    }

    /// The session cookie carrying `token`
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .path("/")
            .max_age(time::Duration::seconds(self.ttl.as_secs() as i64))
            .build()
    }

    /// An immediately expiring replacement for the session cookie
    pub fn cleared_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), String::new()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .path("/")
            .max_age(time::Duration::ZERO)
            .build()
    }

    /// Set the session cookie on an outgoing response
    pub fn attach(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.session_cookie(token))
    }

    /// Expire the session cookie on an outgoing response
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.cleared_cookie())
    }

    /// The raw token from an incoming request, if present and non-empty
    pub fn token_from<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
        jar.get(&self.cookie_name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
    }
}
