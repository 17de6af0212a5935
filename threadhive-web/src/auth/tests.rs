//! Tests for session resolution and the authentication extractors

use super::*;
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::COOKIE, HeaderMap, HeaderValue, Method, Request},
};
use std::sync::Arc;
use threadhive_community::{MemoryCommunityStore, NewIdentity};
use threadhive_core::{EntityId, SessionSettings, ThreadhiveConfig};

const SECRET: &str = "resolver-test-secret";

async fn test_state() -> (AppState, Identity) {
    let store = MemoryCommunityStore::new();
    let alice = store
        .insert_identity(NewIdentity {
            username: "alice".into(),
            email: "alice@example.com".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let config = ThreadhiveConfig {
        session: SessionSettings::with_secret(SECRET),
        ..Default::default()
    };
    let state = AppState::with_store(config, Arc::new(store)).unwrap();
    (state, alice)
}

/// Helper function to create headers carrying a session cookie
fn headers_with_cookie(name: &str, value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{}={}", name, value)).unwrap(),
    );
    headers
}

fn parts_with_headers(headers: HeaderMap) -> axum::http::request::Parts {
    let mut request = Request::builder()
        .method(Method::GET)
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    *request.headers_mut() = headers;
    request.into_parts().0
}

#[tokio::test]
async fn valid_cookie_resolves_the_identity() {
    let (state, alice) = test_state().await;
    let token = state.tokens.issue(alice.id, &alice.email).unwrap();

    let identity = state
        .sessions
        .resolve(&headers_with_cookie("threadhive_token", &token))
        .await
        .expect("identity");
    assert_eq!(identity.id, alice.id);
    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn every_failure_collapses_to_anonymous() {
    let (state, alice) = test_state().await;

    // no cookie
    assert!(state.sessions.resolve(&HeaderMap::new()).await.is_none());

    // cookie under another name
    let token = state.tokens.issue(alice.id, &alice.email).unwrap();
    assert!(state
        .sessions
        .resolve(&headers_with_cookie("other", &token))
        .await
        .is_none());

    // malformed
    assert!(state
        .sessions
        .resolve(&headers_with_cookie("threadhive_token", "garbage"))
        .await
        .is_none());

    // expired
    let long_ago = chrono::Utc::now().timestamp() - state.tokens.ttl().as_secs() as i64 - 60;
    let expired = state
        .tokens
        .issue_at(alice.id, &alice.email, long_ago)
        .unwrap();
    assert!(state
        .sessions
        .resolve(&headers_with_cookie("threadhive_token", &expired))
        .await
        .is_none());

    // signed with another secret
    let foreign = TokenService::from_settings(&SessionSettings::with_secret("other"))
        .unwrap()
        .issue(alice.id, &alice.email)
        .unwrap();
    assert!(state
        .sessions
        .resolve(&headers_with_cookie("threadhive_token", &foreign))
        .await
        .is_none());

    // subject that no longer exists
    let ghost = state
        .tokens
        .issue(EntityId::new(alice.id.get() + 100), "ghost@example.com")
        .unwrap();
    assert!(state
        .sessions
        .resolve(&headers_with_cookie("threadhive_token", &ghost))
        .await
        .is_none());
}

#[tokio::test]
async fn current_user_rejects_anonymous_requests() {
    let (state, _) = test_state().await;
    let mut parts = parts_with_headers(HeaderMap::new());

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthenticated)));
}

#[tokio::test]
async fn current_user_accepts_a_session_cookie() {
    let (state, alice) = test_state().await;
    let token = state.tokens.issue(alice.id, &alice.email).unwrap();
    let mut parts = parts_with_headers(headers_with_cookie("threadhive_token", &token));

    let CurrentUser(identity) = CurrentUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(identity.id, alice.id);
}

#[tokio::test]
async fn optional_user_never_rejects() {
    let (state, alice) = test_state().await;

    let mut parts = parts_with_headers(headers_with_cookie("threadhive_token", "garbage"));
    let user = OptionalUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert!(user.0.is_none());
    assert!(user.id().is_none());

    let token = state.tokens.issue(alice.id, &alice.email).unwrap();
    let mut parts = parts_with_headers(headers_with_cookie("threadhive_token", &token));
    let user = OptionalUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(user.id(), Some(alice.id));
}

#[tokio::test]
async fn logins_are_refused_until_a_verifier_is_installed() {
    let (state, alice) = test_state().await;
    let credentials = Credentials {
        email: alice.email.clone(),
        password: "anything".into(),
    };

    assert!(state.credentials.verify(&credentials).await.unwrap().is_none());
    assert!(!format!("{:?}", credentials).contains("anything"));
}
