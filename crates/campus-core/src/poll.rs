//! Polls: questions with a fixed option list and a closing date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  moderation::{ApprovalState, Moderated, SubmissionKind},
};

pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
  pub text:  String,
  pub votes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
  pub poll_id:    Uuid,
  pub question:   String,
  /// In display order; votes refer to options by index.
  pub options:    Vec<PollOption>,
  pub end_date:   DateTime<Utc>,
  pub creator_id: Uuid,
  pub approval:   ApprovalState,
  pub created_at: DateTime<Utc>,
}

impl Poll {
  pub fn is_open(&self, now: DateTime<Utc>) -> bool { now < self.end_date }

  pub fn total_votes(&self) -> u32 { self.options.iter().map(|o| o.votes).sum() }
}

impl Moderated for Poll {
  const KIND: SubmissionKind = SubmissionKind::Poll;

  fn id(&self) -> Uuid { self.poll_id }

  fn creator_id(&self) -> Uuid { self.creator_id }

  fn approval(&self) -> ApprovalState { self.approval }
}

/// Input to [`crate::workflow::Workflow::submit_poll`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
  pub question: String,
  pub options:  Vec<String>,
  pub end_date: DateTime<Utc>,
}

impl NewPoll {
  /// Require a question, at least [`MIN_OPTIONS`] non-blank options and an
  /// end date after `now`.
  pub fn validate(self, now: DateTime<Utc>) -> Result<Self> {
    let question = self.question.trim().to_owned();
    if question.is_empty() {
      return Err(Error::Validation("Poll question is required".into()));
    }

    let options: Vec<String> = self
      .options
      .into_iter()
      .map(|o| o.trim().to_owned())
      .filter(|o| !o.is_empty())
      .collect();
    if options.len() < MIN_OPTIONS {
      return Err(Error::Validation(format!(
        "A poll needs at least {MIN_OPTIONS} options"
      )));
    }

    if self.end_date <= now {
      return Err(Error::Validation("Poll end date must be in the future".into()));
    }

    Ok(Self { question, options, end_date: self.end_date })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn poll(options: &[&str], end_in: Duration) -> NewPoll {
    NewPoll {
      question: "Best snack?".into(),
      options:  options.iter().map(|s| s.to_string()).collect(),
      end_date: Utc::now() + end_in,
    }
  }

  #[test]
  fn one_option_is_not_enough() {
    let err = poll(&["Chips", "  "], Duration::days(1))
      .validate(Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Validation(m) if m.contains("at least 2")));
  }

  #[test]
  fn past_end_date_is_rejected() {
    let err = poll(&["Chips", "Fruit"], Duration::days(-1))
      .validate(Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn options_are_trimmed() {
    let p = poll(&[" Chips ", "Fruit"], Duration::days(1))
      .validate(Utc::now())
      .unwrap();
    assert_eq!(p.options, vec!["Chips".to_string(), "Fruit".to_string()]);
  }
}
