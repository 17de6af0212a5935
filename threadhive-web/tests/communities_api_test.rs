//! HTTP contract tests for the community endpoints

mod helpers;

use axum::http::{header, Method, StatusCode};
use helpers::spawn_app;
use serde_json::json;

#[tokio::test]
async fn anonymous_mutations_are_rejected_before_validation() {
    let app = spawn_app().await;

    let cases = [
        (Method::POST, "/communities", Some(json!({}))),
        (Method::PUT, "/communities", Some(json!({}))),
        (Method::DELETE, "/communities", Some(json!({}))),
        (Method::POST, "/communities/not-a-number/join", None),
        (Method::POST, "/communities/1/leave", None),
        (Method::PATCH, "/communities/1/role", Some(json!({}))),
    ];

    for (method, uri, body) in cases {
        let response = app.request(method.clone(), uri, None, body).await;
        assert_eq!(
            response.status,
            StatusCode::UNAUTHORIZED,
            "{} {}",
            method,
            uri
        );
        assert_eq!(response.error_code(), "unauthenticated");
    }
}

#[tokio::test]
async fn create_requires_a_name() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;

    let response = app
        .post("/communities", Some(&alice), Some(json!({ "description": "x" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/communities",
            Some(&alice),
            Some(json!({ "name": "rust", "rules": "be kind" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["message"], "community created");
    assert_eq!(response.body["community"]["name"], "rust");
    assert_eq!(response.body["community"]["rules"], "be kind");
    assert_eq!(response.body["community"]["createdBy"], alice.id.to_string());
    assert!(response.body["community"]["id"].is_string());
}

#[tokio::test]
async fn join_and_leave_follow_the_status_contract() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let id = app.create_community(&alice, "c").await;

    let join = format!("/communities/{}/join", id);
    let leave = format!("/communities/{}/leave", id);

    let response = app.post(&join, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = app.post(&join, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "already_member");

    let response = app.post(&leave, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Left community successfully");

    let response = app.post(&leave, Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "not_a_member");

    let response = app.post(&leave, Some(&alice), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "sole_owner_must_transfer");

    let response = app.post("/communities/999/join", Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.post("/communities/abc/join", Some(&bob), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn role_changes_follow_the_permission_matrix() {
    let app = spawn_app().await;
    let owner = app.create_user("owner").await;
    let admin = app.create_user("admin").await;
    let member = app.create_user("member").await;
    let outsider = app.create_user("outsider").await;
    let id = app.create_community(&owner, "c").await;
    for user in [&admin, &member] {
        app.post(&format!("/communities/{}/join", id), Some(user), None)
            .await;
    }
    let role = format!("/communities/{}/role", id);

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&owner),
            Some(json!({ "targetUserId": admin.id.to_string(), "newRole": "ADMIN" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Role Updated");
    assert_eq!(response.body["membership"]["userId"], admin.id.to_string());
    assert_eq!(response.body["membership"]["role"], "ADMIN");

    // numeric ids are accepted too
    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&admin),
            Some(json!({ "targetUserId": admin.id.get(), "newRole": "MEMBER" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "only_owner_for_admin");

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&member),
            Some(json!({ "targetUserId": owner.id.to_string(), "newRole": "MEMBER" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "cannot_modify_owner");

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&owner),
            Some(json!({ "targetUserId": member.id.to_string(), "newRole": "OWNER" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "ownership_transfer_not_supported_here");

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&owner),
            Some(json!({ "targetUserId": outsider.id.to_string(), "newRole": "MEMBER" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "target_not_a_member");

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&outsider),
            Some(json!({ "targetUserId": member.id.to_string(), "newRole": "GUEST" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "not_a_member");

    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&owner),
            Some(json!({ "targetUserId": member.id.to_string(), "newRole": "EMPEROR" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request(Method::PATCH, &role, Some(&owner), Some(json!({ "newRole": "MEMBER" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // ADMIN manages members
    let response = app
        .request(
            Method::PATCH,
            &role,
            Some(&admin),
            Some(json!({ "targetUserId": member.id.to_string(), "newRole": "MODERATOR" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["membership"]["role"], "MODERATOR");
}

#[tokio::test]
async fn edit_and_delete_require_roles() {
    let app = spawn_app().await;
    let owner = app.create_user("owner").await;
    let member = app.create_user("member").await;
    let id = app.create_community(&owner, "before").await;
    app.post(&format!("/communities/{}/join", id), Some(&member), None)
        .await;

    let response = app
        .request(Method::PUT, "/communities", Some(&owner), Some(json!({ "name": "x" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PUT,
            "/communities",
            Some(&member),
            Some(json!({ "id": id, "name": "hijacked" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "insufficient_role");

    let response = app
        .request(Method::PUT, "/communities", Some(&owner), Some(json!({ "id": id })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "validation_error");

    let response = app
        .request(
            Method::PUT,
            "/communities",
            Some(&owner),
            Some(json!({ "id": id, "description": "now with a description" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Community Updated");
    assert_eq!(response.body["community"]["name"], "before");
    assert_eq!(
        response.body["community"]["description"],
        "now with a description"
    );

    let response = app
        .request(Method::DELETE, "/communities", Some(&member), Some(json!({ "id": id })))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request(Method::DELETE, "/communities", Some(&owner), Some(json!({ "id": id })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Community deleted");

    let response = app
        .request(Method::DELETE, "/communities", Some(&owner), Some(json!({ "id": id })))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_pages_and_projects_membership() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    for i in 0..45 {
        app.create_community(&alice, &format!("c{:02}", i)).await;
    }
    app.post("/communities/45/join", Some(&bob), None).await;

    let mut ids = Vec::new();
    let mut uri = "/communities?limit=20".to_string();
    let mut pages = 0;
    loop {
        let response = app.get(&uri, Some(&bob)).await;
        assert_eq!(response.status, StatusCode::OK);
        pages += 1;
        for row in response.body["data"].as_array().unwrap() {
            ids.push(row["id"].as_str().unwrap().parse::<i64>().unwrap());
        }
        match response.body["nextCursor"].as_str() {
            Some(cursor) => uri = format!("/communities?limit=20&cursor={}", cursor),
            None => {
                assert!(response.body["nextCursor"].is_null());
                break;
            }
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(ids, (1..=45).rev().collect::<Vec<i64>>());

    let response = app.get("/communities?limit=1", Some(&bob)).await;
    let row = &response.body["data"][0];
    assert_eq!(row["isMember"], true);
    assert_eq!(row["role"], "MEMBER");
    assert_eq!(row["counts"]["members"], 2);
    assert_eq!(row["creator"]["username"], "alice");

    let response = app.get("/communities?mine=true", Some(&bob)).await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);

    let response = app.get("/communities?limit=1", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"][0]["isMember"], false);
    assert!(response.body["data"][0]["role"].is_null());

    let response = app.get("/communities?mine=true", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/communities?cursor=abc", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // oversized and junk limits are clamped or defaulted
    let response = app.get("/communities?limit=500", None).await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 45);
    let response = app.get("/communities?limit=abc&sort=bogus", None).await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 20);
    assert_eq!(response.body["data"][0]["id"], "45");
}

#[tokio::test]
async fn detail_reports_viewer_membership() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let id = app.create_community(&alice, "c").await;
    let uri = format!("/communities/{}", id);

    let response = app.get(&uri, Some(&alice)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["isMember"], true);
    assert_eq!(response.body["myRole"], "OWNER");
    assert_eq!(response.body["counts"]["members"], 1);
    assert_eq!(response.body["counts"]["posts"], 0);

    let response = app.get(&uri, None).await;
    assert_eq!(response.body["isMember"], false);
    assert!(response.body["myRole"].is_null());

    assert_eq!(
        app.get("/communities/999", None).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/communities/abc", None).await.status,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn logout_expires_the_cookie_and_me_reports_the_session() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;

    let response = app.get("/auth/me", Some(&alice)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "alice");
    assert!(response.body.get("passwordHash").is_none());

    assert_eq!(
        app.get("/auth/me", None).await.status,
        StatusCode::UNAUTHORIZED
    );

    let response = app.post("/auth/logout", Some(&alice), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["ok"], true);
    let set_cookie = response
        .headers
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("threadhive_token=;"), "{}", set_cookie);
    assert!(set_cookie.contains("Max-Age=0"), "{}", set_cookie);
    assert!(set_cookie.contains("Path=/"), "{}", set_cookie);
}

#[tokio::test]
async fn health_reports_the_store() {
    let app = spawn_app().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
}
