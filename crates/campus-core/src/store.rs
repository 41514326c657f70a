//! The `PortalStore` trait.
//!
//! Implemented by storage backends (e.g. `campus-store-sqlite`). Every write
//! touches exactly one entity and is atomic on its own; nothing here spans
//! entities, and there are no transactions across calls.

use std::future::Future;

use uuid::Uuid;

use crate::{
  club::{Club, NewClub},
  lost_item::{ItemStatus, LostItem, NewLostItem},
  moderation::ApprovalState,
  poll::{NewPoll, Poll},
  user::{NewUser, User},
};

/// Abstraction over a campus portal persistence backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PortalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. Returns `None` if the email is already registered.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up by (already normalised) email.
  fn find_user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── Clubs ─────────────────────────────────────────────────────────────

  /// Persist a validated club with its initial approval state.
  fn add_club(
    &self,
    input: NewClub,
    creator_id: Uuid,
    approval: ApprovalState,
  ) -> impl Future<Output = Result<Club, Self::Error>> + Send + '_;

  fn get_club(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Club>, Self::Error>> + Send + '_;

  /// All clubs in `approval`, newest first.
  fn list_clubs(
    &self,
    approval: ApprovalState,
  ) -> impl Future<Output = Result<Vec<Club>, Self::Error>> + Send + '_;

  /// Set the club's state to approved, whatever it was. Returns the updated
  /// club, or `None` if it does not exist.
  fn approve_club(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Club>, Self::Error>> + Send + '_;

  /// Delete a club outright. Returns the deleted club, or `None`.
  fn delete_club(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Club>, Self::Error>> + Send + '_;

  /// Add a member. Returns `false` if `user_id` was already a member.
  fn add_club_member(
    &self,
    club_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Polls ─────────────────────────────────────────────────────────────

  fn add_poll(
    &self,
    input: NewPoll,
    creator_id: Uuid,
    approval: ApprovalState,
  ) -> impl Future<Output = Result<Poll, Self::Error>> + Send + '_;

  fn get_poll(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Poll>, Self::Error>> + Send + '_;

  fn list_polls(
    &self,
    approval: ApprovalState,
  ) -> impl Future<Output = Result<Vec<Poll>, Self::Error>> + Send + '_;

  fn approve_poll(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Poll>, Self::Error>> + Send + '_;

  fn delete_poll(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Poll>, Self::Error>> + Send + '_;

  /// Record one vote. Returns `false` if `user_id` already voted on the poll.
  fn record_vote(
    &self,
    poll_id: Uuid,
    user_id: Uuid,
    option: usize,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Lost items ────────────────────────────────────────────────────────

  fn add_lost_item(
    &self,
    input: NewLostItem,
    reporter_id: Uuid,
  ) -> impl Future<Output = Result<LostItem, Self::Error>> + Send + '_;

  fn get_lost_item(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<LostItem>, Self::Error>> + Send + '_;

  /// All items, optionally restricted to one status, newest first.
  fn list_lost_items(
    &self,
    status: Option<ItemStatus>,
  ) -> impl Future<Output = Result<Vec<LostItem>, Self::Error>> + Send + '_;

  /// Overwrite the item's claim fields unconditionally. Returns `false` if the
  /// item no longer exists.
  fn save_lost_item<'a>(
    &'a self,
    item: &'a LostItem,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Overwrite the item's claim fields only if its stored revision is still
  /// `expected_revision`, as one atomic write. Returns `false` if nothing
  /// matched.
  fn save_lost_item_if<'a>(
    &'a self,
    item: &'a LostItem,
    expected_revision: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns `false` if the item did not exist.
  fn delete_lost_item(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
