//! In-memory community storage
//!
//! All state sits behind one `RwLock`; every trait operation takes the guard
//! once, so each operation is atomic with respect to the others.

use super::{CommunityStore, NewIdentity, Removal, RoleAssignment, StoreError, StoreResult};
use crate::types::{
    fold_case, CommunityPatch, CommunitySummary, CreatorSummary, ListQuery, NewCommunity, SortKey,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use threadhive_core::{Community, EntityId, Identity, Membership, Role};

#[derive(Default)]
struct State {
    identities: HashMap<EntityId, Identity>,
    communities: BTreeMap<EntityId, Community>,
    memberships: HashMap<(EntityId, EntityId), Membership>,
    post_counts: HashMap<EntityId, u64>,
    next_identity: i64,
    next_community: i64,
}

impl State {
    fn member_count(&self, community: EntityId) -> u64 {
        self.memberships
            .keys()
            .filter(|(c, _)| *c == community)
            .count() as u64
    }

    fn owner_count(&self, community: EntityId) -> u64 {
        self.memberships
            .values()
            .filter(|m| m.community_id == community && m.role == Role::Owner)
            .count() as u64
    }

    fn summarize(&self, community: &Community, viewer: Option<EntityId>) -> CommunitySummary {
        let creator = self
            .identities
            .get(&community.created_by)
            .map(|identity| CreatorSummary {
                id: identity.id,
                username: identity.username.clone(),
                avatar_url: identity.avatar_url.clone(),
            });

        let viewer_role = viewer
            .and_then(|user| self.memberships.get(&(community.id, user)))
            .map(|m| m.role);

        CommunitySummary {
            community: community.clone(),
            creator,
            member_count: self.member_count(community.id),
            post_count: self.post_counts.get(&community.id).copied().unwrap_or(0),
            viewer_role,
        }
    }
}

/// Listing order; `Less` means `a` comes first
fn compare(sort: SortKey, a: &CommunitySummary, b: &CommunitySummary) -> Ordering {
    let (a_id, b_id) = (a.community.id, b.community.id);
    match sort {
        SortKey::Newest => b_id.cmp(&a_id),
        SortKey::Members => b
            .member_count
            .cmp(&a.member_count)
            .then_with(|| b_id.cmp(&a_id)),
        SortKey::Posts => b
            .post_count
            .cmp(&a.post_count)
            .then_with(|| b_id.cmp(&a_id)),
        SortKey::Name => a
            .community
            .name
            .cmp(&b.community.name)
            .then_with(|| a_id.cmp(&b_id)),
    }
}

fn matches_search(community: &Community, needle: &str) -> bool {
    let needle = fold_case(needle);
    fold_case(&community.name).contains(&needle)
        || community
            .description
            .as_deref()
            .is_some_and(|d| fold_case(d).contains(&needle))
}

/// In-memory community store
#[derive(Clone, Default)]
pub struct MemoryCommunityStore {
    state: Arc<RwLock<State>>,
}

impl MemoryCommunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an identity (registration is handled elsewhere)
    pub async fn insert_identity(&self, new: NewIdentity) -> StoreResult<Identity> {
        let mut state = self.state.write().await;

        let taken = state
            .identities
            .values()
            .any(|i| i.username == new.username || i.email == new.email);
        if taken {
            return Err(StoreError::UniqueViolation {
                constraint: "users.username/users.email".to_string(),
            });
        }

        state.next_identity += 1;
        let identity = Identity {
            id: EntityId::new(state.next_identity),
            username: new.username,
            email: new.email,
            bio: new.bio,
            avatar_url: new.avatar_url,
            created_at: Utc::now(),
            last_login_at: None,
        };
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    /// Count a post against a community (posting is handled elsewhere)
    pub async fn record_post(&self, community: EntityId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.communities.contains_key(&community) {
            return Err(StoreError::MissingReference {
                message: format!("community {} does not exist", community),
            });
        }
        *state.post_counts.entry(community).or_insert(0) += 1;
        Ok(())
    }
}

#[async_trait]
impl CommunityStore for MemoryCommunityStore {
    async fn find_identity(&self, id: EntityId) -> StoreResult<Option<Identity>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn record_login(&self, id: EntityId, at: DateTime<Utc>) -> StoreResult<Option<Identity>> {
        let mut state = self.state.write().await;
        Ok(state.identities.get_mut(&id).map(|identity| {
            identity.last_login_at = Some(at);
            identity.clone()
        }))
    }

    async fn create_community(
        &self,
        new: &NewCommunity,
        creator: EntityId,
    ) -> StoreResult<Community> {
        let mut state = self.state.write().await;
        if !state.identities.contains_key(&creator) {
            return Err(StoreError::MissingReference {
                message: format!("user {} does not exist", creator),
            });
        }

        state.next_community += 1;
        let now = Utc::now();
        let community = Community {
            id: EntityId::new(state.next_community),
            name: new.name.clone(),
            description: new.description.clone(),
            rules: new.rules.clone(),
            avatar_url: new.avatar_url.clone(),
            banner_url: new.banner_url.clone(),
            created_by: creator,
            created_at: now,
        };

        state.communities.insert(community.id, community.clone());
        state.memberships.insert(
            (community.id, creator),
            Membership {
                community_id: community.id,
                user_id: creator,
                role: Role::Owner,
                assigned_by: Some(creator),
                joined_at: now,
            },
        );

        debug!("Created community {} in memory storage", community.id);
        Ok(community)
    }

    async fn find_community(&self, id: EntityId) -> StoreResult<Option<Community>> {
        Ok(self.state.read().await.communities.get(&id).cloned())
    }

    async fn update_community(
        &self,
        id: EntityId,
        patch: &CommunityPatch,
    ) -> StoreResult<Option<Community>> {
        let mut state = self.state.write().await;
        Ok(state.communities.get_mut(&id).map(|community| {
            patch.apply_to(community);
            community.clone()
        }))
    }

    async fn delete_community(&self, id: EntityId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.communities.remove(&id).is_none() {
            return Ok(false);
        }
        state.memberships.retain(|(community, _), _| *community != id);
        state.post_counts.remove(&id);
        debug!("Deleted community {} from memory storage", id);
        Ok(true)
    }

    async fn find_membership(
        &self,
        community: EntityId,
        user: EntityId,
    ) -> StoreResult<Option<Membership>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .get(&(community, user))
            .cloned())
    }

    async fn insert_membership(
        &self,
        community: EntityId,
        user: EntityId,
        role: Role,
    ) -> StoreResult<Membership> {
        let mut state = self.state.write().await;
        if !state.communities.contains_key(&community) || !state.identities.contains_key(&user) {
            return Err(StoreError::MissingReference {
                message: format!("community {} or user {} does not exist", community, user),
            });
        }
        if state.memberships.contains_key(&(community, user)) {
            return Err(StoreError::UniqueViolation {
                constraint: "community_memberships.community_id, community_memberships.user_id"
                    .to_string(),
            });
        }

        let membership = Membership {
            community_id: community,
            user_id: user,
            role,
            assigned_by: None,
            joined_at: Utc::now(),
        };
        state
            .memberships
            .insert((community, user), membership.clone());
        Ok(membership)
    }

    async fn count_owners(&self, community: EntityId) -> StoreResult<u64> {
        Ok(self.state.read().await.owner_count(community))
    }

    async fn remove_membership(
        &self,
        community: EntityId,
        user: EntityId,
    ) -> StoreResult<Removal> {
        let mut state = self.state.write().await;
        let role = match state.memberships.get(&(community, user)) {
            Some(membership) => membership.role,
            None => return Ok(Removal::Missing),
        };

        if role == Role::Owner && state.owner_count(community) <= 1 {
            return Ok(Removal::SoleOwner);
        }

        state.memberships.remove(&(community, user));
        Ok(Removal::Removed)
    }

    async fn assign_role(&self, assignment: &RoleAssignment) -> StoreResult<Option<Membership>> {
        if assignment.touches_owner() {
            return Ok(None);
        }

        let mut state = self.state.write().await;
        let actor_holds = state
            .memberships
            .get(&(assignment.community, assignment.actor))
            .is_some_and(|m| m.role == assignment.actor_role);
        if !actor_holds {
            return Ok(None);
        }

        Ok(state
            .memberships
            .get_mut(&(assignment.community, assignment.target))
            .filter(|m| m.role == assignment.expected)
            .map(|membership| {
                membership.role = assignment.role;
                membership.assigned_by = Some(assignment.actor);
                membership.clone()
            }))
    }

    async fn list_communities(&self, query: &ListQuery) -> StoreResult<Vec<CommunitySummary>> {
        let state = self.state.read().await;

        let anchor = match query.cursor {
            Some(cursor) => match state.communities.get(&cursor) {
                Some(community) => Some(state.summarize(community, query.viewer)),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut rows: Vec<CommunitySummary> = state
            .communities
            .values()
            .filter(|c| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(c, needle))
            })
            .filter(|c| {
                query
                    .only_member_of
                    .map_or(true, |user| state.memberships.contains_key(&(c.id, user)))
            })
            .map(|c| state.summarize(c, query.viewer))
            .filter(|row| {
                anchor
                    .as_ref()
                    .map_or(true, |a| compare(query.sort, a, row) == Ordering::Less)
            })
            .collect();

        rows.sort_by(|a, b| compare(query.sort, a, b));
        rows.truncate(query.fetch);
        Ok(rows)
    }

    async fn community_detail(
        &self,
        id: EntityId,
        viewer: Option<EntityId>,
    ) -> StoreResult<Option<CommunitySummary>> {
        let state = self.state.read().await;
        Ok(state
            .communities
            .get(&id)
            .map(|community| state.summarize(community, viewer)))
    }

    async fn health_check(&self) -> StoreResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }
}
