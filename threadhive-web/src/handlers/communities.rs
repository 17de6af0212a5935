//! Community CRUD and listing handlers

use super::types::*;
use crate::auth::{CurrentUser, OptionalUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use threadhive_community::{ListParams, NewCommunity, SortKey};
use threadhive_core::parse_id;

/// `POST /communities`
pub async fn create_community(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    payload: Result<Json<NewCommunity>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CommunityEnvelope>)> {
    let Json(new) = payload?;
    let community = state.membership.create(actor.id, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommunityEnvelope {
            message: "community created",
            community,
        }),
    ))
}

/// `PUT /communities`
pub async fn edit_community(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    payload: Result<Json<EditCommunityRequest>, JsonRejection>,
) -> ApiResult<Json<CommunityEnvelope>> {
    let Json(request) = payload?;
    let id = request
        .id
        .ok_or_else(|| ApiError::bad_request("validation_error", "community ID is required"))?;

    let community = state.membership.edit(actor.id, id, request.patch).await?;

    Ok(Json(CommunityEnvelope {
        message: "Community Updated",
        community,
    }))
}

/// `DELETE /communities`
pub async fn delete_community(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    payload: Result<Json<DeleteCommunityRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    let id = request
        .id
        .ok_or_else(|| ApiError::bad_request("validation_error", "community ID is required"))?;

    state.membership.delete(actor.id, id).await?;

    Ok(Json(MessageResponse {
        message: "Community deleted",
    }))
}

/// `GET /communities?q=&limit=&cursor=&mine=&sort=`
pub async fn list_communities(
    State(state): State<AppState>,
    viewer: OptionalUser,
    query: Result<Query<ListCommunitiesQuery>, QueryRejection>,
) -> ApiResult<Json<CommunityListResponse>> {
    let Query(query) = query?;

    let cursor = query
        .cursor
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| parse_id("cursor", c))
        .transpose()?;

    let params = ListParams {
        search: query.q,
        // non-numeric limits fall back to the default page size
        limit: query.limit.as_deref().and_then(|l| l.trim().parse().ok()),
        cursor,
        mine: query.mine.as_deref() == Some("true"),
        sort: SortKey::parse_lenient(query.sort.as_deref()),
    };

    let page = state.listing.list(viewer.id(), params).await?;
    Ok(Json(page.into()))
}

/// `GET /communities/{id}`
pub async fn get_community(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CommunityDetailResponse>> {
    let id = parse_id("id", &id)?;
    let detail = state.listing.detail(viewer.id(), id).await?;
    Ok(Json(detail.into()))
}
