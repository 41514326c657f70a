//! The approval workflow engine.
//!
//! Every operation runs in two phases: it first commits the state change to
//! the [`PortalStore`], then hands an outbox of notifications to the
//! [`Broadcaster`]. Only the commit decides success. A failed publish is
//! logged and dropped; it never turns a successful operation into an error.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  club::{Club, NewClub},
  lost_item::{ItemStatus, LostItem, NewLostItem},
  moderation::{ApprovalState, Moderated, rejection_reason},
  notify::{Audience, Broadcaster, EventName, Notification},
  policy::{Operation, authorize},
  poll::{NewPoll, Poll},
  role::{Identity, Role},
  store::PortalStore,
};

/// How claim transitions on lost items are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimWriteMode {
  /// The status precondition is part of the write itself; a concurrent
  /// transition makes the later write fail with a conflict.
  #[default]
  Conditional,
  /// Read, check, then overwrite. Two concurrent claims on the same item can
  /// both succeed, and the later write's claimant wins.
  LastWriteWins,
}

/// A freshly persisted submission plus the status line shown to its creator.
#[derive(Debug, Clone, Serialize)]
pub struct Submitted<T> {
  pub entity:  T,
  pub message: String,
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// Notifications collected during an operation, published after the commit.
#[derive(Debug, Default)]
struct Outbox(Vec<(Audience, Notification)>);

impl Outbox {
  fn push(&mut self, audience: Audience, event: EventName, data: &impl Serialize) {
    match Notification::new(event, data) {
      Ok(n) => self.0.push((audience, n)),
      Err(e) => warn!(%event, error = %e, "failed to encode notification payload"),
    }
  }

  fn single(audience: Audience, event: EventName, data: &impl Serialize) -> Self {
    let mut outbox = Self::default();
    outbox.push(audience, event, data);
    outbox
  }
}

fn submission_outbox<T: Moderated>(entity: &T) -> Outbox {
  if entity.approval().is_approved() {
    Outbox::single(Audience::All, T::KIND.created_event(), entity)
  } else {
    Outbox::single(Audience::Role(Role::Admin), T::KIND.pending_event(), entity)
  }
}

fn submission_message<T: Moderated>(entity: &T) -> String {
  let label = T::KIND.label();
  if entity.approval().is_approved() {
    format!("{label} created successfully")
  } else {
    format!("{label} submitted successfully. Waiting for admin approval")
  }
}

fn approval_outbox<T: Moderated>(entity: &T) -> Outbox {
  let mut outbox = Outbox::single(Audience::All, T::KIND.approved_event(), entity);
  outbox.push(
    Audience::User(entity.creator_id()),
    EventName::SubmissionApproved,
    &json!({
      "kind":    T::KIND,
      "id":      entity.id(),
      "message": format!(
        "Your {} has been approved and is now live",
        T::KIND.label().to_lowercase()
      ),
    }),
  );
  outbox
}

fn rejection_outbox<T: Moderated>(entity: &T, reason: &str) -> Outbox {
  Outbox::single(
    Audience::User(entity.creator_id()),
    T::KIND.rejected_event(),
    &json!({ "id": entity.id(), "reason": reason }),
  )
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Drives clubs, polls and lost-item claims through their lifecycles.
///
/// Cloning is cheap; the store and broadcaster are shared.
pub struct Workflow<S, B> {
  store:       Arc<S>,
  broadcaster: Arc<B>,
  claim_mode:  ClaimWriteMode,
}

impl<S, B> Clone for Workflow<S, B> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      broadcaster: self.broadcaster.clone(),
      claim_mode:  self.claim_mode,
    }
  }
}

impl<S, B> Workflow<S, B>
where
  S: PortalStore,
  B: Broadcaster,
{
  pub fn new(store: Arc<S>, broadcaster: Arc<B>) -> Self {
    Self { store, broadcaster, claim_mode: ClaimWriteMode::default() }
  }

  pub fn with_claim_mode(mut self, mode: ClaimWriteMode) -> Self {
    self.claim_mode = mode;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn claim_mode(&self) -> ClaimWriteMode { self.claim_mode }

  /// Publish phase. Failures are logged and swallowed.
  async fn deliver(&self, outbox: Outbox) {
    for (audience, notification) in outbox.0 {
      let event = notification.event;
      if let Err(e) = self.broadcaster.publish(audience, notification).await {
        warn!(%event, ?audience, error = %e, "notification dropped");
      }
    }
  }

  // ── Clubs ─────────────────────────────────────────────────────────────

  /// Persist a club, live immediately for faculty and admins and queued for
  /// moderation otherwise.
  pub async fn submit_club(
    &self,
    actor: &Identity,
    input: NewClub,
  ) -> Result<Submitted<Club>> {
    authorize(Operation::SubmitClub, actor, None)?;
    let input = input.validate()?;
    let approval = ApprovalState::initial_for(actor.role);

    let club = self
      .store
      .add_club(input, actor.user_id, approval)
      .await
      .map_err(Error::store)?;
    info!(club_id = %club.club_id, approval = approval.as_ref(), "club submitted");

    self.deliver(submission_outbox(&club)).await;
    Ok(Submitted { message: submission_message(&club), entity: club })
  }

  /// Approve a club. Approving an approved club rewrites the same state.
  pub async fn approve_club(&self, actor: &Identity, id: Uuid) -> Result<Club> {
    authorize(Operation::ApproveClub, actor, None)?;
    let club = self
      .store
      .approve_club(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| club_not_found(id))?;
    info!(club_id = %id, admin = %actor.user_id, "club approved");

    self.deliver(approval_outbox(&club)).await;
    Ok(club)
  }

  /// Reject a club by deleting it. Only the creator is told, with the reason.
  pub async fn reject_club(
    &self,
    actor: &Identity,
    id: Uuid,
    reason: Option<String>,
  ) -> Result<Club> {
    authorize(Operation::RejectClub, actor, None)?;
    let club = self
      .store
      .delete_club(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| club_not_found(id))?;
    let reason = rejection_reason(reason);
    info!(club_id = %id, admin = %actor.user_id, %reason, "club rejected");

    self.deliver(rejection_outbox(&club, &reason)).await;
    Ok(club)
  }

  /// Approved clubs only.
  pub async fn clubs(&self) -> Result<Vec<Club>> {
    self
      .store
      .list_clubs(ApprovalState::Approved)
      .await
      .map_err(Error::store)
  }

  pub async fn pending_clubs(&self, actor: &Identity) -> Result<Vec<Club>> {
    authorize(Operation::ListPendingClubs, actor, None)?;
    self
      .store
      .list_clubs(ApprovalState::Pending)
      .await
      .map_err(Error::store)
  }

  /// A pending club is visible only to its creator and admins.
  pub async fn club(&self, actor: &Identity, id: Uuid) -> Result<Club> {
    let club = self
      .store
      .get_club(id)
      .await
      .map_err(Error::store)?
      .filter(|c| visible_to(c, actor))
      .ok_or_else(|| club_not_found(id))?;
    Ok(club)
  }

  pub async fn join_club(&self, actor: &Identity, id: Uuid) -> Result<Club> {
    authorize(Operation::JoinClub, actor, None)?;
    self
      .store
      .get_club(id)
      .await
      .map_err(Error::store)?
      .filter(|c| c.approval.is_approved())
      .ok_or_else(|| club_not_found(id))?;

    let added = self
      .store
      .add_club_member(id, actor.user_id)
      .await
      .map_err(Error::store)?;
    if !added {
      return Err(Error::Conflict("You are already a member of this club".into()));
    }

    self
      .store
      .get_club(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| club_not_found(id))
  }

  // ── Polls ─────────────────────────────────────────────────────────────

  pub async fn submit_poll(
    &self,
    actor: &Identity,
    input: NewPoll,
  ) -> Result<Submitted<Poll>> {
    authorize(Operation::SubmitPoll, actor, None)?;
    let input = input.validate(Utc::now())?;
    let approval = ApprovalState::initial_for(actor.role);

    let poll = self
      .store
      .add_poll(input, actor.user_id, approval)
      .await
      .map_err(Error::store)?;
    info!(poll_id = %poll.poll_id, approval = approval.as_ref(), "poll submitted");

    self.deliver(submission_outbox(&poll)).await;
    Ok(Submitted { message: submission_message(&poll), entity: poll })
  }

  pub async fn approve_poll(&self, actor: &Identity, id: Uuid) -> Result<Poll> {
    authorize(Operation::ApprovePoll, actor, None)?;
    let poll = self
      .store
      .approve_poll(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| poll_not_found(id))?;
    info!(poll_id = %id, admin = %actor.user_id, "poll approved");

    self.deliver(approval_outbox(&poll)).await;
    Ok(poll)
  }

  pub async fn reject_poll(
    &self,
    actor: &Identity,
    id: Uuid,
    reason: Option<String>,
  ) -> Result<Poll> {
    authorize(Operation::RejectPoll, actor, None)?;
    let poll = self
      .store
      .delete_poll(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| poll_not_found(id))?;
    let reason = rejection_reason(reason);
    info!(poll_id = %id, admin = %actor.user_id, %reason, "poll rejected");

    self.deliver(rejection_outbox(&poll, &reason)).await;
    Ok(poll)
  }

  pub async fn polls(&self) -> Result<Vec<Poll>> {
    self
      .store
      .list_polls(ApprovalState::Approved)
      .await
      .map_err(Error::store)
  }

  pub async fn pending_polls(&self, actor: &Identity) -> Result<Vec<Poll>> {
    authorize(Operation::ListPendingPolls, actor, None)?;
    self
      .store
      .list_polls(ApprovalState::Pending)
      .await
      .map_err(Error::store)
  }

  pub async fn poll(&self, actor: &Identity, id: Uuid) -> Result<Poll> {
    let poll = self
      .store
      .get_poll(id)
      .await
      .map_err(Error::store)?
      .filter(|p| visible_to(p, actor))
      .ok_or_else(|| poll_not_found(id))?;
    Ok(poll)
  }

  /// Cast the actor's single vote on an open, approved poll.
  pub async fn vote(&self, actor: &Identity, id: Uuid, option: usize) -> Result<Poll> {
    authorize(Operation::VotePoll, actor, None)?;
    let poll = self
      .store
      .get_poll(id)
      .await
      .map_err(Error::store)?
      .filter(|p| p.approval.is_approved())
      .ok_or_else(|| poll_not_found(id))?;

    if !poll.is_open(Utc::now()) {
      return Err(Error::Validation("This poll has ended".into()));
    }
    if option >= poll.options.len() {
      return Err(Error::Validation("Invalid poll option".into()));
    }

    let recorded = self
      .store
      .record_vote(id, actor.user_id, option)
      .await
      .map_err(Error::store)?;
    if !recorded {
      return Err(Error::Conflict("You have already voted on this poll".into()));
    }

    let poll = self
      .store
      .get_poll(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| poll_not_found(id))?;

    self
      .deliver(Outbox::single(Audience::All, EventName::PollVoted, &poll))
      .await;
    Ok(poll)
  }

  // ── Lost items ────────────────────────────────────────────────────────

  pub async fn report_item(&self, actor: &Identity, input: NewLostItem) -> Result<LostItem> {
    authorize(Operation::ReportItem, actor, None)?;
    let input = input.validate()?;
    let item = self
      .store
      .add_lost_item(input, actor.user_id)
      .await
      .map_err(Error::store)?;
    info!(item_id = %item.item_id, "lost item reported");

    self
      .deliver(Outbox::single(Audience::All, EventName::NewLostItem, &item))
      .await;
    Ok(item)
  }

  pub async fn lost_items(&self, status: Option<ItemStatus>) -> Result<Vec<LostItem>> {
    self.store.list_lost_items(status).await.map_err(Error::store)
  }

  pub async fn lost_item(&self, id: Uuid) -> Result<LostItem> {
    self
      .store
      .get_lost_item(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| item_not_found(id))
  }

  pub async fn delete_item(&self, actor: &Identity, id: Uuid) -> Result<()> {
    let item = self.lost_item(id).await?;
    authorize(Operation::DeleteItem, actor, Some(item.reporter_id))?;

    let deleted = self.store.delete_lost_item(id).await.map_err(Error::store)?;
    if !deleted {
      return Err(item_not_found(id));
    }
    info!(item_id = %id, by = %actor.user_id, "lost item deleted");

    self
      .deliver(Outbox::single(
        Audience::All,
        EventName::LostItemDeleted,
        &json!({ "id": id }),
      ))
      .await;
    Ok(())
  }

  /// `active → pending-approval`, recording the actor as claimant.
  pub async fn request_claim(&self, actor: &Identity, id: Uuid) -> Result<LostItem> {
    authorize(Operation::RequestClaim, actor, None)?;
    let mut item = self.lost_item(id).await?;
    let expected = item.revision;

    item.request_claim(actor.user_id, Utc::now())?;
    self.write_claim(&item, expected).await?;
    info!(item_id = %id, claimant = %actor.user_id, "claim requested");

    self
      .deliver(Outbox::single(
        Audience::All,
        EventName::LostItemClaimRequested,
        &item,
      ))
      .await;
    Ok(item)
  }

  /// `pending-approval → resolved`.
  pub async fn approve_claim(&self, actor: &Identity, id: Uuid) -> Result<LostItem> {
    authorize(Operation::ApproveClaim, actor, None)?;
    let mut item = self.lost_item(id).await?;
    let expected = item.revision;

    item.approve_claim(actor.user_id, Utc::now())?;
    self.write_claim(&item, expected).await?;
    info!(item_id = %id, admin = %actor.user_id, "claim approved");

    self
      .deliver(Outbox::single(
        Audience::All,
        EventName::LostItemClaimApproved,
        &item,
      ))
      .await;
    Ok(item)
  }

  /// `pending-approval → active`. The item stays; the claimant is cleared.
  pub async fn reject_claim(
    &self,
    actor: &Identity,
    id: Uuid,
    reason: Option<String>,
  ) -> Result<LostItem> {
    authorize(Operation::RejectClaim, actor, None)?;
    let mut item = self.lost_item(id).await?;
    let expected = item.revision;

    item.reject_claim(reason)?;
    self.write_claim(&item, expected).await?;
    info!(item_id = %id, admin = %actor.user_id, "claim rejected");

    self
      .deliver(Outbox::single(
        Audience::All,
        EventName::LostItemClaimRejected,
        &item,
      ))
      .await;
    Ok(item)
  }

  async fn write_claim(&self, item: &LostItem, expected: i64) -> Result<()> {
    let id = item.item_id;
    match self.claim_mode {
      ClaimWriteMode::Conditional => {
        let written = self
          .store
          .save_lost_item_if(item, expected)
          .await
          .map_err(Error::store)?;
        if written {
          return Ok(());
        }
        // Either the item vanished or another request moved it first.
        match self.store.get_lost_item(id).await.map_err(Error::store)? {
          None => Err(item_not_found(id)),
          Some(_) => Err(Error::Conflict(
            "This item was updated by another request; refresh and try again".into(),
          )),
        }
      }
      ClaimWriteMode::LastWriteWins => {
        let written = self.store.save_lost_item(item).await.map_err(Error::store)?;
        if written { Ok(()) } else { Err(item_not_found(id)) }
      }
    }
  }
}

fn visible_to<T: Moderated>(entity: &T, actor: &Identity) -> bool {
  entity.approval().is_approved() || actor.is_owner_or_admin(entity.creator_id())
}

fn club_not_found(id: Uuid) -> Error { Error::NotFound(format!("Club {id} not found")) }

fn poll_not_found(id: Uuid) -> Error { Error::NotFound(format!("Poll {id} not found")) }

fn item_not_found(id: Uuid) -> Error { Error::NotFound(format!("Lost item {id} not found")) }
