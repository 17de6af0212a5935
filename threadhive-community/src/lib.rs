//! Threadhive Community - membership, role authorization and listing
//!
//! This crate holds the rules of the community model:
//!
//! - **Role Authorizer** (`authorizer`): pure allow/deny decisions
//! - **Membership Service** (`membership`): create, edit, delete, join, leave
//!   and role changes, enforcing the ownership invariants
//! - **Listing Service** (`listing`): filtered, sorted, cursor-paged listings
//!   projected for the viewer
//! - **Storage** (`store`): the `CommunityStore` seam with in-memory and
//!   SQLite backends
//!
//! ## Architecture
//!
//! - **Core** (threadhive-core): ids, roles, records, configuration
//! - **Community** (this crate): business rules and persistence
//! - **Presentation** (threadhive-web): sessions and HTTP

pub mod authorizer;
pub mod listing;
pub mod membership;
pub mod store;
pub mod types;

pub use authorizer::{authorize, Action, Decision, DenyReason};
pub use listing::{page_size, ListParams, ListingService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use membership::MembershipService;
pub use store::{
    CommunityStore, MemoryCommunityStore, NewIdentity, Removal, RoleAssignment, StoreError,
};
#[cfg(feature = "sqlite")]
pub use store::SqliteCommunityStore;
pub use types::{
    CommunityPatch, CommunitySummary, CreatorSummary, ListQuery, NewCommunity, Page, SortKey,
};

/// How a denial should be presented to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialClass {
    /// The actor lacks permission
    Forbidden,
    /// The request collides with existing state
    Conflict,
    /// The request cannot be carried out as asked
    Rejected,
}

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum CommunityError {
    #[error("{reason}")]
    Denied {
        action: &'static str,
        reason: DenyReason,
    },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    /// Concurrent writers kept invalidating a guarded update
    #[error("Concurrent update on {resource}, retry the request")]
    Contended { resource: String },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type CommunityResult<T> = Result<T, CommunityError>;

impl CommunityError {
    /// Create a denial for an action
    pub fn denied(action: &Action, reason: DenyReason) -> Self {
        Self::Denied {
            action: action.name(),
            reason,
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify a denial; `None` for every other error
    pub fn denial_class(&self) -> Option<DenialClass> {
        match self {
            Self::Denied { action, reason } => Some(match reason {
                DenyReason::AlreadyMember => DenialClass::Conflict,
                DenyReason::SoleOwnerMustTransfer
                | DenyReason::TargetNotAMember
                | DenyReason::OwnershipTransferNotSupportedHere => DenialClass::Rejected,
                DenyReason::NotAMember if *action == "leave_community" => DenialClass::Rejected,
                _ => DenialClass::Forbidden,
            }),
            _ => None,
        }
    }
}

impl From<threadhive_core::CoreError> for CommunityError {
    fn from(err: threadhive_core::CoreError) -> Self {
        match err {
            threadhive_core::CoreError::Validation { field, message } => {
                Self::Validation { field, message }
            }
            other => Self::Validation {
                field: "input".to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadhive_core::Role;

    #[test]
    fn denials_are_classified_per_action() {
        let leave = Action::LeaveCommunity { owner_count: 1 };
        let change = Action::ChangeRole {
            target: None,
            requested: Role::Member,
        };

        assert_eq!(
            CommunityError::denied(&Action::JoinCommunity, DenyReason::AlreadyMember)
                .denial_class(),
            Some(DenialClass::Conflict)
        );
        assert_eq!(
            CommunityError::denied(&leave, DenyReason::NotAMember).denial_class(),
            Some(DenialClass::Rejected)
        );
        assert_eq!(
            CommunityError::denied(&change, DenyReason::NotAMember).denial_class(),
            Some(DenialClass::Forbidden)
        );
        assert_eq!(
            CommunityError::denied(&change, DenyReason::TargetNotAMember).denial_class(),
            Some(DenialClass::Rejected)
        );
        assert_eq!(
            CommunityError::denied(&change, DenyReason::CannotModifyOwner).denial_class(),
            Some(DenialClass::Forbidden)
        );
        assert_eq!(CommunityError::not_found("community").denial_class(), None);
    }

    #[test]
    fn denial_display_is_the_reason_message() {
        let err = CommunityError::denied(&Action::DeleteCommunity, DenyReason::InsufficientRole);
        assert_eq!(err.to_string(), DenyReason::InsufficientRole.message());
    }
}
