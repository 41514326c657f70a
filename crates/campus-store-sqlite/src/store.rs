//! [`SqliteStore`], the SQLite implementation of [`PortalStore`].

use std::path::Path;

use campus_core::{
  club::{Club, NewClub},
  lost_item::{ItemStatus, LostItem, NewLostItem},
  moderation::ApprovalState,
  poll::{NewPoll, Poll, PollOption},
  store::PortalStore,
  user::{NewUser, User},
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    CLUB_COLUMNS, ClaimColumns, ITEM_COLUMNS, POLL_COLUMNS, RawClub, RawLostItem,
    RawPoll, RawUser, USER_COLUMNS, encode_dt, encode_options, encode_uuid,
  },
  schema::{MIGRATE_V1_TO_V2, SCHEMA},
};

// ─── Row loaders ─────────────────────────────────────────────────────────────
//
// These run on the connection thread inside `Connection::call`.

fn load_club(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawClub>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CLUB_COLUMNS} FROM clubs WHERE club_id = ?1"),
      params![id],
      RawClub::from_row,
    )
    .optional()?;
  let Some(mut raw) = raw else { return Ok(None) };
  raw.members = club_members(conn, id)?;
  Ok(Some(raw))
}

fn club_members(conn: &Connection, club_id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT user_id FROM club_members WHERE club_id = ?1 ORDER BY joined_at, user_id",
  )?;
  stmt
    .query_map(params![club_id], |row| row.get(0))?
    .collect()
}

fn load_clubs(conn: &Connection, approval: &str) -> rusqlite::Result<Vec<RawClub>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {CLUB_COLUMNS} FROM clubs WHERE approval = ?1 ORDER BY created_at DESC"
  ))?;
  let mut clubs = stmt
    .query_map(params![approval], RawClub::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for club in &mut clubs {
    club.members = club_members(conn, &club.club_id)?;
  }
  Ok(clubs)
}

fn load_poll(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawPoll>> {
  let raw = conn
    .query_row(
      &format!("SELECT {POLL_COLUMNS} FROM polls WHERE poll_id = ?1"),
      params![id],
      RawPoll::from_row,
    )
    .optional()?;
  let Some(mut raw) = raw else { return Ok(None) };
  raw.tallies = poll_tallies(conn, id)?;
  Ok(Some(raw))
}

fn poll_tallies(conn: &Connection, poll_id: &str) -> rusqlite::Result<Vec<(i64, i64)>> {
  let mut stmt = conn.prepare_cached(
    "SELECT option_index, COUNT(*) FROM poll_votes WHERE poll_id = ?1 GROUP BY option_index",
  )?;
  stmt
    .query_map(params![poll_id], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect()
}

fn load_polls(conn: &Connection, approval: &str) -> rusqlite::Result<Vec<RawPoll>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {POLL_COLUMNS} FROM polls WHERE approval = ?1 ORDER BY created_at DESC"
  ))?;
  let mut polls = stmt
    .query_map(params![approval], RawPoll::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for poll in &mut polls {
    poll.tallies = poll_tallies(conn, &poll.poll_id)?;
  }
  Ok(polls)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A campus portal store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 1 {
          conn.execute_batch(MIGRATE_V1_TO_V2)?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Flip the approval column of one row in `table` and return whether a row
  /// matched.
  async fn set_approved(
    &self,
    table: &'static str,
    id_column: &'static str,
    id: Uuid,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let approved = ApprovalState::Approved.as_ref().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!("UPDATE {table} SET approval = ?2 WHERE {id_column} = ?1"),
          params![id_str, approved],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}

// ─── PortalStore impl ────────────────────────────────────────────────────────

impl PortalStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<Option<User>> {
    let user = User {
      user_id:       Uuid::new_v4(),
      name:          input.name,
      email:         input.email,
      role:          input.role,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.name.clone();
    let email    = user.email.clone();
    let role     = user.role.as_ref().to_owned();
    let hash     = user.password_hash.clone();
    let at_str   = encode_dt(user.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO users (user_id, name, email, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(email) DO NOTHING",
          params![id_str, name, email, role, hash, at_str],
        )?)
      })
      .await?;

    Ok((inserted > 0).then_some(user))
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let email = email.to_owned();
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
              params![email],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  // ── Clubs ─────────────────────────────────────────────────────────────────

  async fn add_club(
    &self,
    input: NewClub,
    creator_id: Uuid,
    approval: ApprovalState,
  ) -> Result<Club> {
    let club = Club {
      club_id: Uuid::new_v4(),
      category: input.category_or_default().to_owned(),
      name: input.name,
      description: input.description,
      creator_id,
      approval,
      members: Vec::new(),
      created_at: Utc::now(),
    };

    let id_str      = encode_uuid(club.club_id);
    let name        = club.name.clone();
    let description = club.description.clone();
    let category    = club.category.clone();
    let creator_str = encode_uuid(creator_id);
    let approval    = approval.as_ref().to_owned();
    let at_str      = encode_dt(club.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO clubs (club_id, name, description, category, creator_id, approval, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![id_str, name, description, category, creator_str, approval, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(club)
  }

  async fn get_club(&self, id: Uuid) -> Result<Option<Club>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(load_club(conn, &id_str)?))
      .await?;
    raw.map(RawClub::into_club).transpose()
  }

  async fn list_clubs(&self, approval: ApprovalState) -> Result<Vec<Club>> {
    let approval = approval.as_ref().to_owned();
    let raws = self
      .conn
      .call(move |conn| Ok(load_clubs(conn, &approval)?))
      .await?;
    raws.into_iter().map(RawClub::into_club).collect()
  }

  async fn approve_club(&self, id: Uuid) -> Result<Option<Club>> {
    if !self.set_approved("clubs", "club_id", id).await? {
      return Ok(None);
    }
    self.get_club(id).await
  }

  async fn delete_club(&self, id: Uuid) -> Result<Option<Club>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = load_club(&tx, &id_str)?;
        if raw.is_some() {
          tx.execute("DELETE FROM clubs WHERE club_id = ?1", params![id_str])?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawClub::into_club).transpose()
  }

  async fn add_club_member(&self, club_id: Uuid, user_id: Uuid) -> Result<bool> {
    let club_str = encode_uuid(club_id);
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO club_members (club_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
          params![club_str, user_str, at_str],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  // ── Polls ─────────────────────────────────────────────────────────────────

  async fn add_poll(
    &self,
    input: NewPoll,
    creator_id: Uuid,
    approval: ApprovalState,
  ) -> Result<Poll> {
    let options_json = encode_options(&input.options)?;
    let poll = Poll {
      poll_id: Uuid::new_v4(),
      question: input.question,
      options: input
        .options
        .into_iter()
        .map(|text| PollOption { text, votes: 0 })
        .collect(),
      end_date: input.end_date,
      creator_id,
      approval,
      created_at: Utc::now(),
    };

    let id_str      = encode_uuid(poll.poll_id);
    let question    = poll.question.clone();
    let end_str     = encode_dt(poll.end_date);
    let creator_str = encode_uuid(creator_id);
    let approval    = approval.as_ref().to_owned();
    let at_str      = encode_dt(poll.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO polls (poll_id, question, options_json, end_date, creator_id, approval, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![id_str, question, options_json, end_str, creator_str, approval, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(poll)
  }

  async fn get_poll(&self, id: Uuid) -> Result<Option<Poll>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(load_poll(conn, &id_str)?))
      .await?;
    raw.map(RawPoll::into_poll).transpose()
  }

  async fn list_polls(&self, approval: ApprovalState) -> Result<Vec<Poll>> {
    let approval = approval.as_ref().to_owned();
    let raws = self
      .conn
      .call(move |conn| Ok(load_polls(conn, &approval)?))
      .await?;
    raws.into_iter().map(RawPoll::into_poll).collect()
  }

  async fn approve_poll(&self, id: Uuid) -> Result<Option<Poll>> {
    if !self.set_approved("polls", "poll_id", id).await? {
      return Ok(None);
    }
    self.get_poll(id).await
  }

  async fn delete_poll(&self, id: Uuid) -> Result<Option<Poll>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = load_poll(&tx, &id_str)?;
        if raw.is_some() {
          tx.execute("DELETE FROM polls WHERE poll_id = ?1", params![id_str])?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawPoll::into_poll).transpose()
  }

  async fn record_vote(&self, poll_id: Uuid, user_id: Uuid, option: usize) -> Result<bool> {
    let poll_str = encode_uuid(poll_id);
    let user_str = encode_uuid(user_id);
    let index    = option as i64;
    let at_str   = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO poll_votes (poll_id, user_id, option_index, voted_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![poll_str, user_str, index, at_str],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  // ── Lost items ────────────────────────────────────────────────────────────

  async fn add_lost_item(&self, input: NewLostItem, reporter_id: Uuid) -> Result<LostItem> {
    let item = LostItem {
      item_id:            Uuid::new_v4(),
      title:              input.title,
      description:        input.description,
      location:           input.location,
      reporter_id,
      status:             ItemStatus::Active,
      claimant_id:        None,
      claim_requested_at: None,
      resolved_by:        None,
      resolved_at:        None,
      rejection_reason:   None,
      created_at:         Utc::now(),
      revision:           0,
    };

    let id_str       = encode_uuid(item.item_id);
    let title        = item.title.clone();
    let description  = item.description.clone();
    let location     = item.location.clone();
    let reporter_str = encode_uuid(reporter_id);
    let status       = item.status.as_ref().to_owned();
    let at_str       = encode_dt(item.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lost_items (item_id, title, description, location, reporter_id, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![id_str, title, description, location, reporter_str, status, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(item)
  }

  async fn get_lost_item(&self, id: Uuid) -> Result<Option<LostItem>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawLostItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ITEM_COLUMNS} FROM lost_items WHERE item_id = ?1"),
              params![id_str],
              RawLostItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLostItem::into_item).transpose()
  }

  async fn list_lost_items(&self, status: Option<ItemStatus>) -> Result<Vec<LostItem>> {
    let status = status.map(|s| s.as_ref().to_owned());
    let raws: Vec<RawLostItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS} FROM lost_items
           WHERE ?1 IS NULL OR status = ?1
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(params![status], RawLostItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawLostItem::into_item).collect()
  }

  async fn save_lost_item(&self, item: &LostItem) -> Result<bool> {
    let c = ClaimColumns::from(item);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE lost_items
           SET status = ?2, claimant_id = ?3, claim_requested_at = ?4,
               resolved_by = ?5, resolved_at = ?6, rejection_reason = ?7,
               revision = ?8
           WHERE item_id = ?1",
          params![
            c.item_id,
            c.status,
            c.claimant_id,
            c.claim_requested_at,
            c.resolved_by,
            c.resolved_at,
            c.rejection_reason,
            c.revision,
          ],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn save_lost_item_if(&self, item: &LostItem, expected_revision: i64) -> Result<bool> {
    let c = ClaimColumns::from(item);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE lost_items
           SET status = ?2, claimant_id = ?3, claim_requested_at = ?4,
               resolved_by = ?5, resolved_at = ?6, rejection_reason = ?7,
               revision = ?8
           WHERE item_id = ?1 AND revision = ?9",
          params![
            c.item_id,
            c.status,
            c.claimant_id,
            c.claim_requested_at,
            c.resolved_by,
            c.resolved_at,
            c.rejection_reason,
            c.revision,
            expected_revision,
          ],
        )?)
      })
      .await?;
    if changed == 0 {
      debug!(item_id = %item.item_id, expected_revision, "conditional claim write matched no row");
    }
    Ok(changed > 0)
  }

  async fn delete_lost_item(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM lost_items WHERE item_id = ?1", params![id_str])?)
      })
      .await?;
    Ok(changed > 0)
  }
}
