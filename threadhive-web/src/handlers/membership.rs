//! Join, leave and role-change handlers

use super::types::*;
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use threadhive_core::{parse_id, Role};

/// `POST /communities/{id}/join`
pub async fn join_community(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let community = parse_id("id", &id)?;
    state.membership.join(actor.id, community).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Joined community successfully",
        }),
    ))
}

/// `POST /communities/{id}/leave`
pub async fn leave_community(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let community = parse_id("id", &id)?;
    state.membership.leave(actor.id, community).await?;

    Ok(Json(MessageResponse {
        message: "Left community successfully",
    }))
}

/// `PATCH /communities/{id}/role`
pub async fn change_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> ApiResult<Json<RoleChangeResponse>> {
    let community = parse_id("id", &id)?;
    let Json(request) = payload?;

    let (Some(target), Some(new_role)) = (request.target_user_id, request.new_role) else {
        return Err(ApiError::bad_request(
            "validation_error",
            "targetUserId and newRole are required",
        ));
    };
    let requested: Role = new_role.parse()?;

    let membership = state
        .membership
        .change_role(actor.id, community, target, requested)
        .await?;

    Ok(Json(RoleChangeResponse {
        message: "Role Updated",
        membership: membership.into(),
    }))
}
