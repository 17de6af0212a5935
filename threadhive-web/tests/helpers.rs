//! Integration test helpers
//!
//! Builds the full router over an in-memory SQLite store and drives it with
//! `tower::ServiceExt::oneshot`, so no socket is bound. Seeded users can log
//! in with `password_for(username)`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use threadhive_community::{CommunityStore, NewIdentity, SqliteCommunityStore, StoreError};
use threadhive_core::{EntityId, Identity, SessionSettings, ThreadhiveConfig};
use threadhive_web::{
    auth::{CredentialVerifier, Credentials, TokenService},
    create_app, AppState,
};
use tower::ServiceExt;

// Make sure tracing is only initialised once
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

pub const TEST_SECRET: &str = "integration-test-secret";

/// Plain-text passwords for seeded users, keyed by email
pub struct TestCredentials {
    store: SqliteCommunityStore,
    passwords: Mutex<HashMap<String, (EntityId, String)>>,
}

impl TestCredentials {
    fn register(&self, identity: &Identity, password: String) {
        self.passwords
            .lock()
            .unwrap()
            .insert(identity.email.clone(), (identity.id, password));
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for TestCredentials {
    async fn verify(&self, credentials: &Credentials) -> Result<Option<Identity>, StoreError> {
        let entry = self.passwords.lock().unwrap().get(&credentials.email).cloned();
        match entry {
            Some((id, password)) if password == credentials.password => {
                self.store.find_identity(id).await
            }
            _ => Ok(None),
        }
    }
}

pub fn password_for(username: &str) -> String {
    format!("{}-correct-horse", username)
}

/// A running application instance
pub struct TestApp {
    pub app: Router,
    pub store: SqliteCommunityStore,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<TestCredentials>,
}

/// A seeded user and the cookie header that authenticates them
pub struct TestUser {
    pub id: EntityId,
    pub cookie: String,
}

/// A decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `error` code of an error body
    pub fn error_code(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let store = SqliteCommunityStore::connect("sqlite::memory:")
        .await
        .expect("Failed to open test database");
    let config = ThreadhiveConfig {
        session: SessionSettings::with_secret(TEST_SECRET),
        ..Default::default()
    };
    let credentials = Arc::new(TestCredentials {
        store: store.clone(),
        passwords: Mutex::new(HashMap::new()),
    });
    let state = AppState::with_store(config, Arc::new(store.clone()))
        .expect("Failed to build application state")
        .with_credentials(credentials.clone());
    let tokens = state.tokens.clone();

    TestApp {
        app: create_app(state),
        store,
        tokens,
        credentials,
    }
}

impl TestApp {
    /// Seed an identity and sign a session for it
    pub async fn create_user(&self, username: &str) -> TestUser {
        let identity = self
            .store
            .insert_identity(NewIdentity {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                ..Default::default()
            })
            .await
            .expect("Failed to seed identity");
        self.credentials.register(&identity, password_for(username));
        let token = self
            .tokens
            .issue(identity.id, &identity.email)
            .expect("Failed to issue token");

        TestUser {
            id: identity.id,
            cookie: format!("{}={}", self.tokens.cookie_name(), token),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::COOKIE, &user.cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request.");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        self.request(Method::GET, uri, user, None).await
    }

    pub async fn post(&self, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> TestResponse {
        self.request(Method::POST, uri, user, body).await
    }

    /// Create a community owned by `owner` and return its id
    pub async fn create_community(&self, owner: &TestUser, name: &str) -> String {
        let response = self
            .post(
                "/communities",
                Some(owner),
                Some(serde_json::json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["community"]["id"]
            .as_str()
            .expect("community id")
            .to_string()
    }
}
