//! Configuration management
//!
//! Settings come from defaults, an optional TOML file and then environment
//! variables, in that order of precedence (later wins).

use crate::error::{CoreError, CoreResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "threadhive_token";

/// Default session validity: seven days
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadhiveConfig {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

/// HTTP listener and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
        }
    }
}

/// Session token and cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Symmetric signing secret. Required at startup.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub cookie_name: String,
    /// Token validity and cookie max-age, in seconds
    pub ttl_secs: u64,
    /// Mark the cookie `Secure` (production deployments)
    pub secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            secure: false,
        }
    }
}

impl SessionSettings {
    /// Settings with an explicit secret, everything else default.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// The signing secret, or the fatal startup error when it is unset.
    pub fn require_secret(&self) -> CoreResult<&str> {
        match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(CoreError::MissingSecret),
        }
    }
}

impl ThreadhiveConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
        })?;

        toml::from_str(&content).map_err(|e| CoreError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Defaults plus process environment
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> CoreResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("THREADHIVE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("THREADHIVE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| CoreError::config(format!("THREADHIVE_PORT is not a port: {}", port)))?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server.database_url = url;
        }

        if let Some(secret) = lookup("JWT_SECRET") {
            self.session.secret = Some(secret);
        }
        if let Some(name) = lookup("COOKIE_NAME").filter(|n| !n.is_empty()) {
            self.session.cookie_name = name;
        }
        if let Some(ttl) = lookup("JWT_EXPIRES_IN") {
            self.session.ttl_secs = parse_duration(&ttl)?.as_secs();
        }
        let environment = lookup("THREADHIVE_ENV").or_else(|| lookup("APP_ENV"));
        if let Some(env) = environment {
            self.session.secure = env.eq_ignore_ascii_case("production");
        }

        if let Some(level) = lookup("THREADHIVE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject configurations the server must not start with
    pub fn validate(&self) -> CoreResult<()> {
        self.session.require_secret()?;

        if self.session.cookie_name.trim().is_empty() {
            return Err(CoreError::config("session cookie name must not be empty"));
        }
        if self.session.ttl_secs == 0 {
            return Err(CoreError::config("session ttl must be positive"));
        }
        Ok(())
    }

    /// Listener address
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parse `90`, `90s`, `15m`, `12h` or `7d`
pub fn parse_duration(value: &str) -> CoreResult<Duration> {
    let value = value.trim();
    let invalid = || CoreError::config(format!("invalid duration: '{}'", value));

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 60 * 60),
        Some((idx, 'd')) => (&value[..idx], 24 * 60 * 60),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    amount
        .checked_mul(multiplier)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}
