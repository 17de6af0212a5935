//! Route definitions for the Threadhive web server

use crate::{auth, handlers, AppState};
use axum::{
    routing::{get, patch, post},
    Router,
};

/// Community and membership routes
pub fn community_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/communities",
            get(handlers::list_communities)
                .post(handlers::create_community)
                .put(handlers::edit_community)
                .delete(handlers::delete_community),
        )
        .route("/communities/{id}", get(handlers::get_community))
        .route("/communities/{id}/join", post(handlers::join_community))
        .route("/communities/{id}/leave", post(handlers::leave_community))
        .route("/communities/{id}/role", patch(handlers::change_role))
}

/// Session routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::handlers::login))
        .route("/auth/logout", post(auth::handlers::logout))
        .route("/auth/me", get(auth::handlers::me))
}

/// All routes combined
pub fn all_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(community_routes())
        .merge(auth_routes())
}
