//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure renders as `{"success": false, "message": "..."}`.

use axum::{
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::envelope::Envelope;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Malformed input or a failed workflow precondition.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not authenticated")]
  Unauthenticated,

  /// Login failure; the message never says which credential was wrong.
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Store(Box::new(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<campus_core::Error> for ApiError {
  fn from(e: campus_core::Error) -> Self {
    use campus_core::Error;
    match e {
      Error::Validation(m) | Error::Conflict(m) => ApiError::BadRequest(m),
      Error::Forbidden(m) => ApiError::Forbidden(m),
      Error::NotFound(m) => ApiError::NotFound(m),
      Error::Store(e) => ApiError::Store(e),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::BadRequest(m) | ApiError::Forbidden(m) | ApiError::NotFound(m) => m.clone(),
      ApiError::Unauthenticated => "Not authorized, please log in".to_owned(),
      ApiError::InvalidCredentials => "Invalid email or password".to_owned(),
      ApiError::Store(e) => {
        error!(error = %e, "unexpected store failure");
        "Internal server error".to_owned()
      }
    };
    (status, Envelope::failure(message)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conflict_and_validation_are_400() {
    let e: ApiError = campus_core::Error::Conflict("already voted".into()).into();
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    let e: ApiError = campus_core::Error::Validation("need 2 options".into()).into();
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn taxonomy_maps_to_statuses() {
    let cases = [
      (campus_core::Error::Forbidden("no".into()), StatusCode::FORBIDDEN),
      (campus_core::Error::NotFound("gone".into()), StatusCode::NOT_FOUND),
      (
        campus_core::Error::store(std::io::Error::other("disk")),
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
    ];
    for (core, status) in cases {
      assert_eq!(ApiError::from(core).status(), status);
    }
  }

  #[tokio::test]
  async fn store_errors_hide_their_detail() {
    let resp =
      ApiError::from(campus_core::Error::store(std::io::Error::other("disk on fire")))
        .into_response();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Internal server error");
  }
}
