//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so they
//! sort lexically. UUIDs are hyphenated lowercase strings. Enum columns use
//! the same lowercase/kebab-case spelling as the JSON API.

use std::str::FromStr;

use campus_core::{
  Role,
  club::Club,
  lost_item::{ItemStatus, LostItem},
  moderation::ApprovalState,
  poll::{Poll, PollOption},
  user::User,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse a strum-backed enum column.
fn decode_variant<T: FromStr>(column: &'static str, value: String) -> Result<T> {
  T::from_str(&value).map_err(|_| Error::UnknownVariant { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, name, email, role, password_hash, created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub name:          String,
  pub email:         String,
  pub role:          String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      role:          row.get(3)?,
      password_hash: row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      name:          self.name,
      email:         self.email,
      role:          decode_variant::<Role>("role", self.role)?,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const CLUB_COLUMNS: &str =
  "club_id, name, description, category, creator_id, approval, created_at";

/// A `clubs` row plus the ids from its `club_members` rows.
pub struct RawClub {
  pub club_id:     String,
  pub name:        String,
  pub description: String,
  pub category:    String,
  pub creator_id:  String,
  pub approval:    String,
  pub created_at:  String,
  pub members:     Vec<String>,
}

impl RawClub {
  /// Members are filled in separately.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      club_id:     row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      category:    row.get(3)?,
      creator_id:  row.get(4)?,
      approval:    row.get(5)?,
      created_at:  row.get(6)?,
      members:     Vec::new(),
    })
  }

  pub fn into_club(self) -> Result<Club> {
    Ok(Club {
      club_id:     decode_uuid(&self.club_id)?,
      name:        self.name,
      description: self.description,
      category:    self.category,
      creator_id:  decode_uuid(&self.creator_id)?,
      approval:    decode_variant::<ApprovalState>("approval", self.approval)?,
      members:     self
        .members
        .iter()
        .map(|m| decode_uuid(m))
        .collect::<Result<_>>()?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const POLL_COLUMNS: &str =
  "poll_id, question, options_json, end_date, creator_id, approval, created_at";

/// A `polls` row plus per-option vote counts from `poll_votes`.
pub struct RawPoll {
  pub poll_id:      String,
  pub question:     String,
  pub options_json: String,
  pub end_date:     String,
  pub creator_id:   String,
  pub approval:     String,
  pub created_at:   String,
  /// `(option_index, votes)` pairs; options with no votes are absent.
  pub tallies:      Vec<(i64, i64)>,
}

impl RawPoll {
  /// Tallies are filled in separately.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      poll_id:      row.get(0)?,
      question:     row.get(1)?,
      options_json: row.get(2)?,
      end_date:     row.get(3)?,
      creator_id:   row.get(4)?,
      approval:     row.get(5)?,
      created_at:   row.get(6)?,
      tallies:      Vec::new(),
    })
  }

  pub fn into_poll(self) -> Result<Poll> {
    let texts: Vec<String> = serde_json::from_str(&self.options_json)?;
    let mut options: Vec<PollOption> = texts
      .into_iter()
      .map(|text| PollOption { text, votes: 0 })
      .collect();
    for (index, votes) in self.tallies {
      if let Some(opt) = usize::try_from(index).ok().and_then(|i| options.get_mut(i)) {
        opt.votes = u32::try_from(votes).unwrap_or(u32::MAX);
      }
    }

    Ok(Poll {
      poll_id: decode_uuid(&self.poll_id)?,
      question: self.question,
      options,
      end_date: decode_dt(&self.end_date)?,
      creator_id: decode_uuid(&self.creator_id)?,
      approval: decode_variant::<ApprovalState>("approval", self.approval)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub fn encode_options(options: &[String]) -> Result<String> {
  Ok(serde_json::to_string(options)?)
}

pub const ITEM_COLUMNS: &str = "item_id, title, description, location, reporter_id, status, \
   claimant_id, claim_requested_at, resolved_by, resolved_at, rejection_reason, created_at, revision";

/// Raw strings read directly from a `lost_items` row.
pub struct RawLostItem {
  pub item_id:            String,
  pub title:              String,
  pub description:        String,
  pub location:           Option<String>,
  pub reporter_id:        String,
  pub status:             String,
  pub claimant_id:        Option<String>,
  pub claim_requested_at: Option<String>,
  pub resolved_by:        Option<String>,
  pub resolved_at:        Option<String>,
  pub rejection_reason:   Option<String>,
  pub created_at:         String,
  pub revision:           i64,
}

impl RawLostItem {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:            row.get(0)?,
      title:              row.get(1)?,
      description:        row.get(2)?,
      location:           row.get(3)?,
      reporter_id:        row.get(4)?,
      status:             row.get(5)?,
      claimant_id:        row.get(6)?,
      claim_requested_at: row.get(7)?,
      resolved_by:        row.get(8)?,
      resolved_at:        row.get(9)?,
      rejection_reason:   row.get(10)?,
      created_at:         row.get(11)?,
      revision:           row.get(12)?,
    })
  }

  pub fn into_item(self) -> Result<LostItem> {
    Ok(LostItem {
      item_id:            decode_uuid(&self.item_id)?,
      title:              self.title,
      description:        self.description,
      location:           self.location,
      reporter_id:        decode_uuid(&self.reporter_id)?,
      status:             decode_variant::<ItemStatus>("status", self.status)?,
      claimant_id:        decode_opt_uuid(self.claimant_id)?,
      claim_requested_at: decode_opt_dt(self.claim_requested_at)?,
      resolved_by:        decode_opt_uuid(self.resolved_by)?,
      resolved_at:        decode_opt_dt(self.resolved_at)?,
      rejection_reason:   self.rejection_reason,
      created_at:         decode_dt(&self.created_at)?,
      revision:           self.revision,
    })
  }
}

/// Column values for the claim-related fields of a lost item, in the order
/// the update statements bind them.
pub struct ClaimColumns {
  pub item_id:            String,
  pub status:             String,
  pub claimant_id:        Option<String>,
  pub claim_requested_at: Option<String>,
  pub resolved_by:        Option<String>,
  pub resolved_at:        Option<String>,
  pub rejection_reason:   Option<String>,
  pub revision:           i64,
}

impl From<&LostItem> for ClaimColumns {
  fn from(item: &LostItem) -> Self {
    Self {
      item_id:            encode_uuid(item.item_id),
      status:             item.status.as_ref().to_owned(),
      claimant_id:        item.claimant_id.map(encode_uuid),
      claim_requested_at: item.claim_requested_at.map(encode_dt),
      resolved_by:        item.resolved_by.map(encode_uuid),
      resolved_at:        item.resolved_at.map(encode_dt),
      rejection_reason:   item.rejection_reason.clone(),
      revision:           item.revision,
    }
  }
}
