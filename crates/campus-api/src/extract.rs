//! Request extractors whose rejections render as [`ApiError`].

use axum::{
  extract::{FromRequest, FromRequestParts},
  http::request::Parts,
};
use campus_core::Identity;

use crate::error::ApiError;

/// The authenticated caller.
///
/// Reads the [`Identity`] that the authentication middleware stores in the
/// request extensions. If it is missing the request is refused, so a route
/// mounted without the middleware fails closed.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Identity>()
      .copied()
      .map(Actor)
      .ok_or(ApiError::Unauthenticated)
  }
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
