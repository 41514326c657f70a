//! Handlers for `/polls` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/polls` | Approved polls only |
//! | `POST` | `/polls` | Body: [`NewPoll`]; at least two options |
//! | `GET`  | `/polls/pending` | Admin only |
//! | `GET`  | `/polls/:id` | |
//! | `PUT`  | `/polls/:id/approve` | Admin only |
//! | `PUT`  | `/polls/:id/reject` | Admin only; deletes |
//! | `POST` | `/polls/:id/vote` | Body: `{"option": <index>}` |

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use campus_core::{
  Workflow,
  notify::Broadcaster,
  poll::{NewPoll, Poll},
  store::PortalStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  envelope::Envelope,
  error::ApiError,
  extract::{Actor, ApiJson, ApiPath},
  reason_from_body,
};

/// `GET /polls`
pub async fn list<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  _actor: Actor,
) -> Result<Envelope<Vec<Poll>>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::list(wf.polls().await?))
}

/// `POST /polls`
pub async fn submit<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<NewPoll>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let submitted = wf.submit_poll(&actor, body).await?;
  Ok((
    StatusCode::CREATED,
    Envelope::data(submitted.entity).message(submitted.message),
  ))
}

/// `GET /polls/pending`
pub async fn pending<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
) -> Result<Envelope<Vec<Poll>>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::list(wf.pending_polls(&actor).await?))
}

/// `GET /polls/:id`
pub async fn get_one<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Poll>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::data(wf.poll(&actor, id).await?))
}

/// `PUT /polls/:id/approve`
pub async fn approve<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Poll>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let poll = wf.approve_poll(&actor, id).await?;
  Ok(Envelope::data(poll).message("Poll approved successfully"))
}

/// `PUT /polls/:id/reject`
pub async fn reject<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
  body: Bytes,
) -> Result<Envelope<Value>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let reason = reason_from_body(&body)?;
  let poll = wf.reject_poll(&actor, id, reason).await?;
  Ok(Envelope::data(json!({ "id": poll.poll_id })).message("Poll rejected and removed"))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
  pub option: usize,
}

/// `POST /polls/:id/vote`
pub async fn vote<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<VoteBody>,
) -> Result<Envelope<Poll>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let poll = wf.vote(&actor, id, body.option).await?;
  Ok(Envelope::data(poll).message("Vote recorded"))
}
