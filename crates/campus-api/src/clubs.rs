//! Handlers for `/clubs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/clubs` | Approved clubs only |
//! | `POST` | `/clubs` | Body: [`NewClub`]; live at once for faculty/admin |
//! | `GET`  | `/clubs/pending` | Admin only |
//! | `GET`  | `/clubs/:id` | Pending clubs visible to creator and admins |
//! | `PUT`  | `/clubs/:id/approve` | Admin only |
//! | `PUT`  | `/clubs/:id/reject` | Admin only; optional `{"reason":"..."}`; deletes |
//! | `POST` | `/clubs/:id/join` | Approved clubs; once per user |

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use campus_core::{
  Workflow,
  club::{Club, NewClub},
  notify::Broadcaster,
  store::PortalStore,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  envelope::Envelope,
  error::ApiError,
  extract::{Actor, ApiJson, ApiPath},
  reason_from_body,
};

/// `GET /clubs`
pub async fn list<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  _actor: Actor,
) -> Result<Envelope<Vec<Club>>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::list(wf.clubs().await?))
}

/// `POST /clubs`: returns 201 and a message saying whether the club is live.
pub async fn submit<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<NewClub>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let submitted = wf.submit_club(&actor, body).await?;
  Ok((
    StatusCode::CREATED,
    Envelope::data(submitted.entity).message(submitted.message),
  ))
}

/// `GET /clubs/pending`
pub async fn pending<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
) -> Result<Envelope<Vec<Club>>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::list(wf.pending_clubs(&actor).await?))
}

/// `GET /clubs/:id`
pub async fn get_one<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Club>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::data(wf.club(&actor, id).await?))
}

/// `PUT /clubs/:id/approve`
pub async fn approve<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Club>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let club = wf.approve_club(&actor, id).await?;
  Ok(Envelope::data(club).message("Club approved successfully"))
}

/// `PUT /clubs/:id/reject` with an optional `{"reason":"..."}` body.
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
  let club = wf.reject_club(&actor, id, reason).await?;
  Ok(Envelope::data(json!({ "id": club.club_id })).message("Club rejected and removed"))
}

/// `POST /clubs/:id/join`
pub async fn join<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Club>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let club = wf.join_club(&actor, id).await?;
  Ok(Envelope::data(club).message("Joined club successfully"))
}
