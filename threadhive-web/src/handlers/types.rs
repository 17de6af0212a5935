//! Request and response bodies. Field names are camelCase and every id is a
//! decimal string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use threadhive_community::{CommunityPatch, CommunitySummary, CreatorSummary, Page};
use threadhive_core::{Community, EntityId, Membership, Role};

/// Body of `PUT /communities`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCommunityRequest {
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub patch: CommunityPatch,
}

/// Body of `DELETE /communities`
#[derive(Debug, Deserialize)]
pub struct DeleteCommunityRequest {
    pub id: Option<EntityId>,
}

/// Body of `PATCH /communities/{id}/role`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub target_user_id: Option<EntityId>,
    pub new_role: Option<String>,
}

/// Query string of `GET /communities`. Everything arrives as text and is
/// parsed leniently except the cursor.
#[derive(Debug, Default, Deserialize)]
pub struct ListCommunitiesQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
    pub mine: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CommunityEnvelope {
    pub message: &'static str,
    pub community: Community,
}

#[derive(Debug, Serialize)]
pub struct Counts {
    pub members: u64,
    pub posts: u64,
}

/// One listing row
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRow {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub creator: Option<CreatorSummary>,
    pub counts: Counts,
    pub is_member: bool,
    pub role: Option<Role>,
}

impl From<CommunitySummary> for CommunityRow {
    fn from(summary: CommunitySummary) -> Self {
        let is_member = summary.is_member();
        let community = summary.community;
        Self {
            id: community.id,
            name: community.name,
            description: community.description,
            avatar_url: community.avatar_url,
            banner_url: community.banner_url,
            created_at: community.created_at,
            creator: summary.creator,
            counts: Counts {
                members: summary.member_count,
                posts: summary.post_count,
            },
            is_member,
            role: summary.viewer_role,
        }
    }
}

/// `GET /communities` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityListResponse {
    pub data: Vec<CommunityRow>,
    pub next_cursor: Option<EntityId>,
}

impl From<Page<CommunitySummary>> for CommunityListResponse {
    fn from(page: Page<CommunitySummary>) -> Self {
        Self {
            data: page.data.into_iter().map(CommunityRow::from).collect(),
            next_cursor: page.next_cursor,
        }
    }
}

/// `GET /communities/{id}` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDetailResponse {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub creator: Option<CreatorSummary>,
    pub counts: Counts,
    pub is_member: bool,
    pub my_role: Option<Role>,
}

impl From<CommunitySummary> for CommunityDetailResponse {
    fn from(summary: CommunitySummary) -> Self {
        let is_member = summary.is_member();
        let community = summary.community;
        Self {
            id: community.id,
            name: community.name,
            description: community.description,
            rules: community.rules,
            avatar_url: community.avatar_url,
            banner_url: community.banner_url,
            created_at: community.created_at,
            creator: summary.creator,
            counts: Counts {
                members: summary.member_count,
                posts: summary.post_count,
            },
            is_member,
            my_role: summary.viewer_role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub user_id: EntityId,
    pub role: Role,
}

impl From<Membership> for MembershipView {
    fn from(membership: Membership) -> Self {
        Self {
            user_id: membership.user_id,
            role: membership.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleChangeResponse {
    pub message: &'static str,
    pub membership: MembershipView,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
