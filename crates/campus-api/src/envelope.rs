//! The `{success, data?, message?, count?}` response body shared by every
//! endpoint.

use axum::{
  Json,
  response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:    Option<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub count:   Option<usize>,
}

impl<T> Envelope<T> {
  pub fn data(data: T) -> Self {
    Self { success: true, data: Some(data), message: None, count: None }
  }

  pub fn message(mut self, message: impl Into<String>) -> Self {
    self.message = Some(message.into());
    self
  }
}

impl<T> Envelope<Vec<T>> {
  /// A list response; `count` is the number of items.
  pub fn list(items: Vec<T>) -> Self {
    let count = items.len();
    Self { success: true, data: Some(items), message: None, count: Some(count) }
  }
}

impl Envelope<()> {
  pub fn failure(message: impl Into<String>) -> Self {
    Self { success: false, data: None, message: Some(message.into()), count: None }
  }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response { Json(self).into_response() }
}
