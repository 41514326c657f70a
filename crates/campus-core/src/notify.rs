//! Realtime notification vocabulary and the [`Broadcaster`] seam.
//!
//! Delivery is best-effort and at-most-once: an offline recipient simply
//! misses the event and re-fetches on reconnect. Persisted state is always the
//! source of truth.

use std::future::Future;

use serde::Serialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::role::Role;

/// The event name carried in every realtime frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EventName {
  NewClub,
  ClubPendingApproval,
  ClubApproved,
  ClubRejected,
  NewPoll,
  PollPendingApproval,
  PollApproved,
  PollRejected,
  PollVoted,
  /// Personal confirmation to a creator that their club or poll went live.
  SubmissionApproved,
  NewLostItem,
  LostItemDeleted,
  LostItemClaimRequested,
  LostItemClaimApproved,
  LostItemClaimRejected,
}

/// One outbound event: a name plus an already-serialised payload.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
  pub event: EventName,
  pub data:  serde_json::Value,
}

impl Notification {
  pub fn new(event: EventName, data: &impl Serialize) -> serde_json::Result<Self> {
    Ok(Self { event, data: serde_json::to_value(data)? })
  }
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
  All,
  Role(Role),
  User(Uuid),
}

/// Publish primitives over the connection registry.
///
/// Implementations must not block on slow recipients; a recipient that is not
/// connected is silently skipped.
pub trait Broadcaster: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Deliver to every connected channel.
  fn broadcast_all(
    &self,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Deliver to channels registered under `role`.
  fn notify_role(
    &self,
    role: Role,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Deliver to every channel `user_id` currently has open.
  fn notify_user(
    &self,
    user_id: Uuid,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Route to the primitive matching `audience`.
  fn publish(
    &self,
    audience: Audience,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    async move {
      match audience {
        Audience::All => self.broadcast_all(notification).await,
        Audience::Role(role) => self.notify_role(role, notification).await,
        Audience::User(user_id) => self.notify_user(user_id, notification).await,
      }
    }
  }
}
