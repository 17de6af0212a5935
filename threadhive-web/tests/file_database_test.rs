//! The server state over a file-backed SQLite database

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use threadhive_community::{NewIdentity, SqliteCommunityStore};
use threadhive_core::{SessionSettings, ThreadhiveConfig};
use threadhive_web::{create_app, AppState};
use tower::ServiceExt;

fn config_for(url: &str) -> ThreadhiveConfig {
    let mut config = ThreadhiveConfig {
        session: SessionSettings::with_secret("file-db-secret"),
        ..Default::default()
    };
    config.server.database_url = url.to_string();
    config
}

#[tokio::test]
async fn communities_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("hive.db").display());

    let seed = SqliteCommunityStore::connect(&url).await.unwrap();
    let alice = seed
        .insert_identity(NewIdentity {
            username: "alice".into(),
            email: "alice@example.com".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    seed.pool().close().await;

    let state = AppState::new(config_for(&url)).await.unwrap();
    let cookie = format!(
        "{}={}",
        state.tokens.cookie_name(),
        state.tokens.issue(alice.id, &alice.email).unwrap()
    );
    let response = create_app(state)
        .oneshot(
            Request::post("/communities")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"persisted"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // a fresh state over the same file sees the community and the session
    let state = AppState::new(config_for(&url)).await.unwrap();
    let response = create_app(state)
        .oneshot(
            Request::get("/communities/1")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], "persisted");
    assert_eq!(body["myRole"], "OWNER");
}

#[tokio::test]
async fn unreachable_database_is_a_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}",
        dir.path().join("missing").join("hive.db").display()
    );

    assert!(AppState::new(config_for(&url)).await.is_err());
}
