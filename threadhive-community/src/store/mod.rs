//! Community storage backends
//!
//! `CommunityStore` is the seam between the services and persistence. Every
//! multi-step invariant (community + owner membership, last-owner protection,
//! owner immutability) is enforced inside a single store operation so that a
//! concurrent request can never interleave between check and write.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryCommunityStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCommunityStore;

use crate::types::{CommunityPatch, CommunitySummary, ListQuery, NewCommunity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use threadhive_core::{Community, EntityId, Identity, Membership, Role};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced row does not exist
    #[error("Foreign key violated: {message}")]
    MissingReference { message: String },

    /// A stored value could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: String, message: String },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.message().to_string(),
                };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference {
                    message: db_err.message().to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Outcome of a guarded membership removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Refused: the membership is the community's only OWNER
    SoleOwner,
    /// No such membership
    Missing,
}

/// A role write that only applies while both memberships it was authorized
/// against are unchanged: the target still holds `expected` and the actor
/// still holds `actor_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub community: EntityId,
    pub target: EntityId,
    pub expected: Role,
    pub role: Role,
    pub actor: EntityId,
    pub actor_role: Role,
}

impl RoleAssignment {
    /// Writes that can never apply, whatever the stored rows hold
    pub fn touches_owner(&self) -> bool {
        self.role == Role::Owner || self.expected == Role::Owner
    }
}

/// Seed data for identities; registration itself lives outside this crate
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Persistence operations the community services rely on
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Public profile by primary key
    async fn find_identity(&self, id: EntityId) -> StoreResult<Option<Identity>>;

    /// Stamp `last_login_at`, returning the refreshed profile if it exists
    async fn record_login(&self, id: EntityId, at: DateTime<Utc>) -> StoreResult<Option<Identity>>;

    /// Create a community and its creator's OWNER membership atomically
    async fn create_community(
        &self,
        new: &NewCommunity,
        creator: EntityId,
    ) -> StoreResult<Community>;

    async fn find_community(&self, id: EntityId) -> StoreResult<Option<Community>>;

    /// Apply a partial update, returning the updated row if it exists
    async fn update_community(
        &self,
        id: EntityId,
        patch: &CommunityPatch,
    ) -> StoreResult<Option<Community>>;

    /// Delete a community and its memberships; `false` when absent
    async fn delete_community(&self, id: EntityId) -> StoreResult<bool>;

    async fn find_membership(
        &self,
        community: EntityId,
        user: EntityId,
    ) -> StoreResult<Option<Membership>>;

    /// Insert a membership. A duplicate `(community, user)` pair fails with
    /// `StoreError::UniqueViolation`.
    async fn insert_membership(
        &self,
        community: EntityId,
        user: EntityId,
        role: Role,
    ) -> StoreResult<Membership>;

    /// Number of OWNER memberships in a community
    async fn count_owners(&self, community: EntityId) -> StoreResult<u64>;

    /// Remove a membership unless it is the community's last OWNER. The check
    /// and the delete happen in one transaction.
    async fn remove_membership(&self, community: EntityId, user: EntityId)
        -> StoreResult<Removal>;

    /// Apply a guarded role write. OWNER is never written and an OWNER row
    /// is never touched. Returns `None` when either guard no longer holds.
    async fn assign_role(&self, assignment: &RoleAssignment) -> StoreResult<Option<Membership>>;

    /// Filtered, sorted, cursor-paged listing with the viewer's membership
    /// resolved in the same pass
    async fn list_communities(&self, query: &ListQuery) -> StoreResult<Vec<CommunitySummary>>;

    /// A single community projected for a viewer
    async fn community_detail(
        &self,
        id: EntityId,
        viewer: Option<EntityId>,
    ) -> StoreResult<Option<CommunitySummary>>;

    /// Health check for the storage backend
    async fn health_check(&self) -> StoreResult<()>;
}
