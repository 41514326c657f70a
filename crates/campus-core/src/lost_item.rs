//! Lost-and-found items and their claim sub-workflow.
//!
//! ```text
//! [active] ──request_claim──► [pending-approval] ──approve_claim──► [resolved]
//!                                     │
//!                                     └──reject_claim──► [active]
//! ```
//!
//! Unlike club and poll rejection, a rejected claim resets the item rather
//! than deleting anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result, moderation::rejection_reason};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ItemStatus {
  Active,
  PendingApproval,
  Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LostItem {
  pub item_id:            Uuid,
  pub title:              String,
  pub description:        String,
  pub location:           Option<String>,
  pub reporter_id:        Uuid,
  pub status:             ItemStatus,
  pub claimant_id:        Option<Uuid>,
  pub claim_requested_at: Option<DateTime<Utc>>,
  pub resolved_by:        Option<Uuid>,
  pub resolved_at:        Option<DateTime<Utc>>,
  /// Reason given for the most recent rejected claim.
  pub rejection_reason:   Option<String>,
  pub created_at:         DateTime<Utc>,
  /// Bumped by every claim transition. Conditional writes match on it.
  #[serde(default)]
  pub revision:           i64,
}

impl LostItem {
  /// `active → pending-approval`. Fails with a conflict naming why the item is
  /// not claimable.
  pub fn request_claim(&mut self, claimant_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    match self.status {
      ItemStatus::Active => {}
      ItemStatus::PendingApproval => {
        return Err(Error::Conflict(
          "This item already has a pending claim request".into(),
        ));
      }
      ItemStatus::Resolved => {
        return Err(Error::Conflict("This item has already been resolved".into()));
      }
    }
    self.status = ItemStatus::PendingApproval;
    self.claimant_id = Some(claimant_id);
    self.claim_requested_at = Some(now);
    self.revision += 1;
    Ok(())
  }

  /// `pending-approval → resolved`. The claimant is kept.
  pub fn approve_claim(&mut self, resolver_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    self.require_pending()?;
    self.status = ItemStatus::Resolved;
    self.resolved_by = Some(resolver_id);
    self.resolved_at = Some(now);
    self.revision += 1;
    Ok(())
  }

  /// `pending-approval → active`, clearing the claimant.
  pub fn reject_claim(&mut self, reason: Option<String>) -> Result<()> {
    self.require_pending()?;
    self.status = ItemStatus::Active;
    self.claimant_id = None;
    self.claim_requested_at = None;
    self.rejection_reason = Some(rejection_reason(reason));
    self.revision += 1;
    Ok(())
  }

  fn require_pending(&self) -> Result<()> {
    if self.status == ItemStatus::PendingApproval {
      Ok(())
    } else {
      Err(Error::Conflict("This item has no pending claim request".into()))
    }
  }
}

/// Input to [`crate::workflow::Workflow::report_item`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewLostItem {
  pub title:       String,
  #[serde(default)]
  pub description: String,
  pub location:    Option<String>,
}

impl NewLostItem {
  pub fn validate(self) -> Result<Self> {
    let title = self.title.trim().to_owned();
    if title.is_empty() {
      return Err(Error::Validation("Item title is required".into()));
    }
    Ok(Self {
      title,
      description: self.description.trim().to_owned(),
      location: self
        .location
        .map(|l| l.trim().to_owned())
        .filter(|l| !l.is_empty()),
    })
  }
}
