//! Session endpoints

use super::{Credentials, CurrentUser};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::{json, Value};
use threadhive_community::CommunityError;
use threadhive_core::Identity;
use tracing::{debug, info};

/// Check the credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<Identity>)> {
    let Json(credentials) = payload?;
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(ApiError::bad_request(
            "validation_error",
            "email and password are required",
        ));
    }

    let Some(identity) = state
        .credentials
        .verify(&credentials)
        .await
        .map_err(CommunityError::from)?
    else {
        debug!(email = %credentials.email, "Login rejected");
        return Err(ApiError::InvalidCredentials);
    };

    let identity = state
        .store
        .record_login(identity.id, Utc::now())
        .await
        .map_err(CommunityError::from)?
        .unwrap_or(identity);

    let token = state.tokens.issue(identity.id, &identity.email)?;
    info!(user = %identity.id, "Session issued");
    Ok((state.tokens.attach(jar, token), Json(identity)))
}

/// Expire the session cookie. Always succeeds, signed in or not.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    info!("Session cookie cleared");
    (state.tokens.clear(jar), Json(json!({ "ok": true })))
}

/// The identity behind the current session
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}
