//! Portal accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:       Uuid,
  pub name:          String,
  /// Unique, stored lowercased.
  pub email:         String,
  pub role:          Role,
  /// argon2 PHC string. Never serialised into responses.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

impl User {
  pub fn identity(&self) -> Identity { Identity::new(self.user_id, self.role) }
}

/// Input to [`crate::store::PortalStore::add_user`]. Hashing happens before
/// this point; the store never sees a plaintext password.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub role:          Role,
  pub password_hash: String,
}

/// Lowercase and trim an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }
