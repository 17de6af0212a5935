//! Role Authorizer
//!
//! Pure decision function over the actor's membership, the requested action
//! and (for role changes) the target membership and requested role. Nothing in
//! here touches the store; the membership service loads the inputs and acts on
//! the decision.
//!
//! Each action is evaluated as an ordered rule list. The first rule that
//! matches denies; if none match the action is allowed.

use serde::Serialize;
use std::fmt;
use threadhive_core::Role;

/// Why an action was refused. Codes and messages are stable and safe to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAMember,
    TargetNotAMember,
    AlreadyMember,
    SoleOwnerMustTransfer,
    CannotModifyOwner,
    OwnershipTransferNotSupportedHere,
    OnlyOwnerForAdmin,
    InsufficientRole,
}

impl DenyReason {
    /// Machine-readable code clients branch on
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::NotAMember => "not_a_member",
            DenyReason::TargetNotAMember => "target_not_a_member",
            DenyReason::AlreadyMember => "already_member",
            DenyReason::SoleOwnerMustTransfer => "sole_owner_must_transfer",
            DenyReason::CannotModifyOwner => "cannot_modify_owner",
            DenyReason::OwnershipTransferNotSupportedHere => {
                "ownership_transfer_not_supported_here"
            }
            DenyReason::OnlyOwnerForAdmin => "only_owner_for_admin",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }

    /// Human-readable message
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NotAMember => "You are not a member of this community",
            DenyReason::TargetNotAMember => "Target user is not a member of this community",
            DenyReason::AlreadyMember => "Already a member",
            DenyReason::SoleOwnerMustTransfer => "Owner must transfer ownership before leaving",
            DenyReason::CannotModifyOwner => "You cannot change the role of the owner",
            DenyReason::OwnershipTransferNotSupportedHere => {
                "Use a dedicated ownership transfer endpoint"
            }
            DenyReason::OnlyOwnerForAdmin => "Only the owner can assign or modify an admin",
            DenyReason::InsufficientRole => "Your role does not allow this action",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Actions subject to authorization, carrying the facts each one needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCommunity,
    EditCommunity,
    DeleteCommunity,
    /// Allowed only when the actor has no membership yet
    JoinCommunity,
    /// `owner_count` is the number of OWNER memberships in the community
    LeaveCommunity { owner_count: u64 },
    ChangeRole {
        target: Option<Role>,
        requested: Role,
    },
}

impl Action {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateCommunity => "create_community",
            Action::EditCommunity => "edit_community",
            Action::DeleteCommunity => "delete_community",
            Action::JoinCommunity => "join_community",
            Action::LeaveCommunity { .. } => "leave_community",
            Action::ChangeRole { .. } => "change_role",
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[cfg(test)]
    fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Everything a rule may inspect
#[derive(Debug, Clone, Copy)]
struct Facts {
    actor: Option<Role>,
    target: Option<Role>,
    requested: Option<Role>,
    owner_count: u64,
}

type Rule = (DenyReason, fn(&Facts) -> bool);

fn is_owner(role: Option<Role>) -> bool {
    role == Some(Role::Owner)
}

fn is_owner_or_admin(role: Option<Role>) -> bool {
    matches!(role, Some(Role::Owner | Role::Admin))
}

const EDIT_RULES: &[Rule] = &[
    (DenyReason::NotAMember, |f| f.actor.is_none()),
    (DenyReason::InsufficientRole, |f| !is_owner_or_admin(f.actor)),
];

const DELETE_RULES: &[Rule] = &[
    (DenyReason::NotAMember, |f| f.actor.is_none()),
    (DenyReason::InsufficientRole, |f| !is_owner(f.actor)),
];

const JOIN_RULES: &[Rule] = &[(DenyReason::AlreadyMember, |f| f.actor.is_some())];

const LEAVE_RULES: &[Rule] = &[
    (DenyReason::NotAMember, |f| f.actor.is_none()),
    (DenyReason::SoleOwnerMustTransfer, |f| {
        is_owner(f.actor) && f.owner_count <= 1
    }),
];

/// Role-change precedence: "target is ADMIN" is checked before the general
/// insufficient-role check, so an ADMIN acting on an ADMIN gets
/// `OnlyOwnerForAdmin`.
const CHANGE_ROLE_RULES: &[Rule] = &[
    (DenyReason::NotAMember, |f| f.actor.is_none()),
    (DenyReason::TargetNotAMember, |f| f.target.is_none()),
    (DenyReason::CannotModifyOwner, |f| is_owner(f.target)),
    (DenyReason::OwnershipTransferNotSupportedHere, |f| {
        is_owner(f.requested)
    }),
    (DenyReason::OnlyOwnerForAdmin, |f| {
        (f.target == Some(Role::Admin) || f.requested == Some(Role::Admin)) && !is_owner(f.actor)
    }),
    (DenyReason::InsufficientRole, |f| !is_owner_or_admin(f.actor)),
];

fn evaluate(rules: &[Rule], facts: &Facts) -> Decision {
    rules
        .iter()
        .find(|(_, denies)| denies(facts))
        .map(|(reason, _)| Decision::Deny(*reason))
        .unwrap_or(Decision::Allow)
}

/// Decide whether an actor holding `actor` (its role in the community, if
/// any) may perform `action`.
pub fn authorize(action: Action, actor: Option<Role>) -> Decision {
    let mut facts = Facts {
        actor,
        target: None,
        requested: None,
        owner_count: 0,
    };

    let rules = match action {
        Action::CreateCommunity => return Decision::Allow,
        Action::EditCommunity => EDIT_RULES,
        Action::DeleteCommunity => DELETE_RULES,
        Action::JoinCommunity => JOIN_RULES,
        Action::LeaveCommunity { owner_count } => {
            facts.owner_count = owner_count;
            LEAVE_RULES
        }
        Action::ChangeRole { target, requested } => {
            facts.target = target;
            facts.requested = Some(requested);
            CHANGE_ROLE_RULES
        }
    };

    evaluate(rules, &facts)
}
