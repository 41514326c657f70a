//! Clubs: student organisations created through the approval workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  moderation::{ApprovalState, Moderated, SubmissionKind},
};

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
  pub club_id:     Uuid,
  pub name:        String,
  pub description: String,
  pub category:    String,
  /// Set once at submission; never changes.
  pub creator_id:  Uuid,
  pub approval:    ApprovalState,
  pub members:     Vec<Uuid>,
  pub created_at:  DateTime<Utc>,
}

impl Moderated for Club {
  const KIND: SubmissionKind = SubmissionKind::Club;

  fn id(&self) -> Uuid { self.club_id }

  fn creator_id(&self) -> Uuid { self.creator_id }

  fn approval(&self) -> ApprovalState { self.approval }
}

/// Input to [`crate::workflow::Workflow::submit_club`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewClub {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub category:    Option<String>,
}

impl NewClub {
  /// Trim fields and reject an empty name. An empty description is allowed.
  pub fn validate(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("Club name is required".into()));
    }
    let category = self
      .category
      .map(|c| c.trim().to_owned())
      .filter(|c| !c.is_empty());

    Ok(Self {
      name,
      description: self.description.trim().to_owned(),
      category,
    })
  }

  pub fn category_or_default(&self) -> &str {
    self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
  }
}
