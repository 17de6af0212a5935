//! Request and projection types shared by the services and the stores

use serde::{Deserialize, Serialize};
use threadhive_core::{Community, EntityId, Role};

/// Input for creating a community. A missing name deserializes as empty and
/// is rejected by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewCommunity {
    pub name: String,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
}

impl CommunityPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.rules.is_none()
            && self.avatar_url.is_none()
            && self.banner_url.is_none()
    }

    /// Apply to an in-memory row
    pub fn apply_to(&self, community: &mut Community) {
        if let Some(name) = &self.name {
            community.name = name.clone();
        }
        if let Some(description) = &self.description {
            community.description = Some(description.clone());
        }
        if let Some(rules) = &self.rules {
            community.rules = Some(rules.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            community.avatar_url = Some(avatar_url.clone());
        }
        if let Some(banner_url) = &self.banner_url {
            community.banner_url = Some(banner_url.clone());
        }
    }
}

/// Public fields of a community's creator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSummary {
    pub id: EntityId,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A community row projected for one viewer
#[derive(Debug, Clone, PartialEq)]
pub struct CommunitySummary {
    pub community: Community,
    pub creator: Option<CreatorSummary>,
    pub member_count: u64,
    pub post_count: u64,
    /// The viewer's role, loaded in the same query as the row
    pub viewer_role: Option<Role>,
}

impl CommunitySummary {
    pub fn is_member(&self) -> bool {
        self.viewer_role.is_some()
    }
}

/// Listing sort orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// `id DESC`
    #[default]
    Newest,
    /// member count DESC, then `id DESC`
    Members,
    /// post count DESC, then `id DESC`
    Posts,
    /// `name ASC`, then `id ASC`
    Name,
}

impl SortKey {
    /// Lenient parse: unknown values fall back to newest-first
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("members") => SortKey::Members,
            Some("posts") => SortKey::Posts,
            Some("name") => SortKey::Name,
            _ => SortKey::Newest,
        }
    }
}

/// A store-level listing query. `fetch` already includes the look-ahead row.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring over name and description
    pub search: Option<String>,
    /// Restrict to communities the viewer belongs to
    pub only_member_of: Option<EntityId>,
    pub viewer: Option<EntityId>,
    pub sort: SortKey,
    /// Id of the last row of the previous page
    pub cursor: Option<EntityId>,
    pub fetch: usize,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<EntityId>,
}

/// Case folding used for search, applied to stored text and to the needle
/// alike so every backend matches the same rows
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
