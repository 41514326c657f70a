//! Shared vocabulary for submittable-and-moderatable entities.
//!
//! Clubs and polls are either live (`approved`) or waiting in the moderation
//! queue (`pending`). There is no `rejected` state: rejection deletes the
//! entity outright.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{notify::EventName, role::Role};

/// Used when an admin rejects something without saying why.
pub const DEFAULT_REJECTION_REASON: &str = "No reason provided";

/// Trim an optional free-text reason, falling back to
/// [`DEFAULT_REJECTION_REASON`] when it is missing or blank.
pub fn rejection_reason(reason: Option<String>) -> String {
  reason
    .map(|r| r.trim().to_owned())
    .filter(|r| !r.is_empty())
    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_owned())
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalState {
  Pending,
  Approved,
}

impl ApprovalState {
  /// The state a new submission starts in, decided by the submitter's role.
  pub fn initial_for(role: Role) -> Self {
    if role.is_faculty_or_admin() {
      Self::Approved
    } else {
      Self::Pending
    }
  }

  pub fn is_approved(self) -> bool { matches!(self, Self::Approved) }
}

/// Which moderated variant a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
  Club,
  Poll,
}

impl SubmissionKind {
  pub fn label(self) -> &'static str {
    match self {
      Self::Club => "Club",
      Self::Poll => "Poll",
    }
  }

  /// Broadcast to everyone when an entity goes live on submission.
  pub fn created_event(self) -> EventName {
    match self {
      Self::Club => EventName::NewClub,
      Self::Poll => EventName::NewPoll,
    }
  }

  /// Sent to the admin role group when a submission enters the queue.
  pub fn pending_event(self) -> EventName {
    match self {
      Self::Club => EventName::ClubPendingApproval,
      Self::Poll => EventName::PollPendingApproval,
    }
  }

  pub fn approved_event(self) -> EventName {
    match self {
      Self::Club => EventName::ClubApproved,
      Self::Poll => EventName::PollApproved,
    }
  }

  /// Sent to the creator only.
  pub fn rejected_event(self) -> EventName {
    match self {
      Self::Club => EventName::ClubRejected,
      Self::Poll => EventName::PollRejected,
    }
  }
}

/// Implemented by every entity that goes through the approval workflow.
pub trait Moderated: Serialize {
  const KIND: SubmissionKind;

  fn id(&self) -> Uuid;
  fn creator_id(&self) -> Uuid;
  fn approval(&self) -> ApprovalState;
}
