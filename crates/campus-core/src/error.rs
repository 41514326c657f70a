//! Error types for `campus-core`.

use thiserror::Error;

/// Every failure a workflow operation can surface to its caller.
///
/// Operations take an already verified [`crate::Identity`], so a missing or
/// invalid credential never reaches this layer.
#[derive(Debug, Error)]
pub enum Error {
  /// A submission is malformed or missing required fields.
  #[error("{0}")]
  Validation(String),

  /// Valid credential, insufficient role or ownership.
  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  /// A workflow precondition does not hold (claim on a non-active item,
  /// duplicate membership, second vote).
  #[error("{0}")]
  Conflict(String),

  /// Persistence infrastructure failure.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
