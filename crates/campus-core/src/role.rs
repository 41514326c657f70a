//! Roles and the authenticated identity attached to every request and
//! realtime channel.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// The three account roles of the portal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  Student,
  Faculty,
  Admin,
}

impl Role {
  pub fn is_admin(self) -> bool { matches!(self, Self::Admin) }

  /// Faculty and admins bypass moderation when submitting clubs and polls.
  pub fn is_faculty_or_admin(self) -> bool {
    matches!(self, Self::Faculty | Self::Admin)
  }
}

/// Who is acting: extracted from a verified credential, never from a request
/// body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id: Uuid,
  pub role:    Role,
}

impl Identity {
  pub fn new(user_id: Uuid, role: Role) -> Self { Self { user_id, role } }

  pub fn is_admin(&self) -> bool { self.role.is_admin() }

  pub fn is_faculty_or_admin(&self) -> bool { self.role.is_faculty_or_admin() }

  /// True if this identity owns the resource created by `owner_id`, or is an
  /// admin.
  pub fn is_owner_or_admin(&self, owner_id: Uuid) -> bool {
    self.user_id == owner_id || self.is_admin()
  }
}
