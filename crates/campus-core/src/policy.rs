//! The authorization matrix for every workflow operation.
//!
//! Handlers never branch on roles themselves; each operation asks
//! [`authorize`] once, and the answer comes from [`allows`], a single table
//! of `(operation, role, ownership) → allow/deny`. Anything not listed is
//! denied.

use uuid::Uuid;

use crate::{
  Error, Result,
  role::{Identity, Role},
};

/// Every guarded action in the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  SubmitClub,
  ApproveClub,
  RejectClub,
  ListPendingClubs,
  JoinClub,
  SubmitPoll,
  ApprovePoll,
  RejectPoll,
  ListPendingPolls,
  VotePoll,
  ReportItem,
  DeleteItem,
  RequestClaim,
  ApproveClaim,
  RejectClaim,
}

/// The actor's relationship to the target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
  Owner,
  NotOwner,
  /// The operation has no single owned target (listings, submissions).
  NotApplicable,
}

impl Ownership {
  pub fn of(identity: &Identity, owner_id: Option<Uuid>) -> Self {
    match owner_id {
      Some(id) if id == identity.user_id => Self::Owner,
      Some(_) => Self::NotOwner,
      None => Self::NotApplicable,
    }
  }
}

/// The policy table.
pub fn allows(op: Operation, role: Role, ownership: Ownership) -> bool {
  use Operation::*;

  match op {
    // Moderation is admin-only regardless of who created the resource.
    ApproveClub | RejectClub | ListPendingClubs | ApprovePoll | RejectPoll
    | ListPendingPolls | ApproveClaim | RejectClaim => role.is_admin(),

    SubmitClub | JoinClub | SubmitPoll | VotePoll | ReportItem
    | RequestClaim => true,

    DeleteItem => role.is_admin() || ownership == Ownership::Owner,
  }
}

/// Check `identity` against the table for `op` on a resource owned by
/// `owner_id` (if any).
pub fn authorize(
  op: Operation,
  identity: &Identity,
  owner_id: Option<Uuid>,
) -> Result<()> {
  if allows(op, identity.role, Ownership::of(identity, owner_id)) {
    Ok(())
  } else {
    Err(Error::Forbidden(denial_message(op).to_owned()))
  }
}

fn denial_message(op: Operation) -> &'static str {
  match op {
    Operation::DeleteItem => "Only the owner or an admin can do this",
    _ => "Only admins can do this",
  }
}
