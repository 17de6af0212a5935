//! Community Membership Service
//!
//! Loads the memberships a decision needs, asks the authorizer, and only on
//! allow performs the store write. Invariants that depend on state read in
//! the same request (last owner, owner immutability) are re-asserted by the
//! store's guarded writes so a concurrent request cannot slip between the
//! check and the write.

use crate::authorizer::{authorize, Action, DenyReason};
use crate::store::{CommunityStore, Removal, RoleAssignment, StoreError};
use crate::types::{CommunityPatch, NewCommunity};
use crate::{CommunityError, CommunityResult};
use std::sync::Arc;
use threadhive_core::{Community, EntityId, Membership, Role};
use tracing::{debug, info};

/// Guarded role updates retried when the target changes underneath us
const ROLE_CHANGE_ATTEMPTS: usize = 3;

/// Orchestrates membership mutations around the authorizer
#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn CommunityStore>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn CommunityStore>) -> Self {
        Self { store }
    }

    fn check(action: Action, actor: Option<Role>) -> CommunityResult<()> {
        authorize(action, actor).into_result().map_err(|reason| {
            debug!(
                action = action.name(),
                reason = reason.code(),
                "Authorization denied"
            );
            CommunityError::denied(&action, reason)
        })
    }

    async fn actor_role(&self, community: EntityId, actor: EntityId) -> CommunityResult<Option<Role>> {
        Ok(self
            .store
            .find_membership(community, actor)
            .await?
            .map(|m| m.role))
    }

    async fn require_community(&self, id: EntityId) -> CommunityResult<Community> {
        self.store
            .find_community(id)
            .await?
            .ok_or_else(|| CommunityError::not_found(format!("community {}", id)))
    }

    /// Create a community; the creator becomes its OWNER in the same unit of work
    pub async fn create(&self, actor: EntityId, mut new: NewCommunity) -> CommunityResult<Community> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(CommunityError::validation("name", "Name is required"));
        }
        new.name = name.to_string();

        Self::check(Action::CreateCommunity, None)?;

        let community = self.store.create_community(&new, actor).await?;
        info!(community = %community.id, owner = %actor, "Community created");
        Ok(community)
    }

    /// Partially update a community; requires OWNER or ADMIN
    pub async fn edit(
        &self,
        actor: EntityId,
        community: EntityId,
        mut patch: CommunityPatch,
    ) -> CommunityResult<Community> {
        if patch.is_empty() {
            return Err(CommunityError::validation("patch", "Nothing to update"));
        }
        if let Some(name) = patch.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(CommunityError::validation("name", "Name cannot be blank"));
            }
            patch.name = Some(name.to_string());
        }

        self.require_community(community).await?;
        let role = self.actor_role(community, actor).await?;
        Self::check(Action::EditCommunity, role)?;

        let updated = self
            .store
            .update_community(community, &patch)
            .await?
            .ok_or_else(|| CommunityError::not_found(format!("community {}", community)))?;

        info!(community = %community, actor = %actor, "Community updated");
        Ok(updated)
    }

    /// Delete a community and, through the store, its memberships; requires OWNER
    pub async fn delete(&self, actor: EntityId, community: EntityId) -> CommunityResult<()> {
        self.require_community(community).await?;
        let role = self.actor_role(community, actor).await?;
        Self::check(Action::DeleteCommunity, role)?;

        if !self.store.delete_community(community).await? {
            return Err(CommunityError::not_found(format!("community {}", community)));
        }

        info!(community = %community, actor = %actor, "Community deleted");
        Ok(())
    }

    /// Join as MEMBER. The store's uniqueness constraint decides races.
    pub async fn join(&self, actor: EntityId, community: EntityId) -> CommunityResult<Membership> {
        self.require_community(community).await?;
        let role = self.actor_role(community, actor).await?;
        let action = Action::JoinCommunity;
        Self::check(action, role)?;

        match self.store.insert_membership(community, actor, Role::Member).await {
            Ok(membership) => {
                info!(community = %community, user = %actor, "Joined community");
                Ok(membership)
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(community = %community, user = %actor, "Lost join race");
                Err(CommunityError::denied(&action, DenyReason::AlreadyMember))
            }
            Err(StoreError::MissingReference { .. }) => {
                Err(CommunityError::not_found(format!("community {}", community)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Leave a community. The last OWNER can never leave.
    pub async fn leave(&self, actor: EntityId, community: EntityId) -> CommunityResult<()> {
        let role = self.actor_role(community, actor).await?;
        let owner_count = match role {
            Some(Role::Owner) => self.store.count_owners(community).await?,
            _ => 0,
        };

        let action = Action::LeaveCommunity { owner_count };
        Self::check(action, role)?;

        match self.store.remove_membership(community, actor).await? {
            Removal::Removed => {
                info!(community = %community, user = %actor, "Left community");
                Ok(())
            }
            Removal::SoleOwner => Err(CommunityError::denied(
                &action,
                DenyReason::SoleOwnerMustTransfer,
            )),
            Removal::Missing => Err(CommunityError::denied(&action, DenyReason::NotAMember)),
        }
    }

    /// Change a member's role, recording the actor as `assigned_by`.
    ///
    /// The write is conditioned on both memberships still holding the roles
    /// the decision was made on. If either changed in between, both are read
    /// again and the decision is retaken.
    pub async fn change_role(
        &self,
        actor: EntityId,
        community: EntityId,
        target: EntityId,
        requested: Role,
    ) -> CommunityResult<Membership> {
        for attempt in 1..=ROLE_CHANGE_ATTEMPTS {
            let (actor_membership, target_membership) = futures::try_join!(
                self.store.find_membership(community, actor),
                self.store.find_membership(community, target),
            )?;
            let actor_role = actor_membership.map(|m| m.role);
            let current = target_membership.map(|m| m.role);

            Self::check(
                Action::ChangeRole {
                    target: current,
                    requested,
                },
                actor_role,
            )?;

            // An allow implies both memberships exist
            let (Some(actor_role), Some(expected)) = (actor_role, current) else {
                break;
            };

            let assignment = RoleAssignment {
                community,
                target,
                expected,
                role: requested,
                actor,
                actor_role,
            };
            if let Some(updated) = self.store.assign_role(&assignment).await? {
                info!(
                    community = %community,
                    target = %target,
                    actor = %actor,
                    role = requested.as_str(),
                    "Role updated"
                );
                return Ok(updated);
            }

            debug!(
                community = %community,
                target = %target,
                attempt,
                "Memberships changed before the role write"
            );
        }

        Err(CommunityError::Contended {
            resource: format!("membership {}/{}", community, target),
        })
    }
}
