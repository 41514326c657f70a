//! JSON REST API for the campus portal.
//!
//! Exposes an axum [`Router`] backed by a [`Workflow`]. Every handler takes
//! an [`extract::Actor`], so the router must be wrapped in middleware that
//! places a [`campus_core::Identity`] in the request extensions. Without it
//! every request is answered with 401.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", campus_api::api_router(workflow.clone()))
//! ```

pub mod clubs;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod lost_items;
pub mod polls;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use campus_core::{Workflow, notify::Broadcaster, store::PortalStore};
use serde::Deserialize;

pub use envelope::Envelope;
pub use error::ApiError;

/// Build the API router for `workflow`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B>(workflow: Arc<Workflow<S, B>>) -> Router<()>
where
  S: PortalStore + 'static,
  B: Broadcaster + 'static,
{
  Router::new()
    // Clubs
    .route("/clubs", get(clubs::list::<S, B>).post(clubs::submit::<S, B>))
    .route("/clubs/pending", get(clubs::pending::<S, B>))
    .route("/clubs/{id}", get(clubs::get_one::<S, B>))
    .route("/clubs/{id}/approve", put(clubs::approve::<S, B>))
    .route("/clubs/{id}/reject", put(clubs::reject::<S, B>))
    .route("/clubs/{id}/join", post(clubs::join::<S, B>))
    // Polls
    .route("/polls", get(polls::list::<S, B>).post(polls::submit::<S, B>))
    .route("/polls/pending", get(polls::pending::<S, B>))
    .route("/polls/{id}", get(polls::get_one::<S, B>))
    .route("/polls/{id}/approve", put(polls::approve::<S, B>))
    .route("/polls/{id}/reject", put(polls::reject::<S, B>))
    .route("/polls/{id}/vote", post(polls::vote::<S, B>))
    // Lost and found
    .route(
      "/lost-items",
      get(lost_items::list::<S, B>).post(lost_items::report::<S, B>),
    )
    .route(
      "/lost-items/{id}",
      get(lost_items::get_one::<S, B>).delete(lost_items::delete::<S, B>),
    )
    .route("/lost-items/{id}/claim", post(lost_items::claim::<S, B>))
    .route("/lost-items/{id}/approve", post(lost_items::approve::<S, B>))
    .route("/lost-items/{id}/reject", post(lost_items::reject::<S, B>))
    .with_state(workflow)
}

#[derive(Debug, Default, Deserialize)]
struct ReasonBody {
  reason: Option<String>,
}

/// Parse the optional `{"reason": "..."}` body of a reject request. An empty
/// body means no reason.
pub(crate) fn reason_from_body(body: &[u8]) -> Result<Option<String>, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(None);
  }
  let parsed: ReasonBody = serde_json::from_slice(body)
    .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
  Ok(parsed.reason)
}
