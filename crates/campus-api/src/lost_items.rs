//! Handlers for `/lost-items` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/lost-items` | Optional `?status=active\|pending-approval\|resolved` |
//! | `POST`   | `/lost-items` | Body: [`NewLostItem`] |
//! | `GET`    | `/lost-items/:id` | |
//! | `DELETE` | `/lost-items/:id` | Reporter or admin |
//! | `POST`   | `/lost-items/:id/claim` | Any user; item must be active |
//! | `POST`   | `/lost-items/:id/approve` | Admin only |
//! | `POST`   | `/lost-items/:id/reject` | Admin only; optional `{"reason":"..."}` |

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use campus_core::{
  Workflow,
  lost_item::{ItemStatus, LostItem, NewLostItem},
  notify::Broadcaster,
  store::PortalStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  envelope::Envelope,
  error::ApiError,
  extract::{Actor, ApiJson, ApiPath, ApiQuery},
  reason_from_body,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status: Option<ItemStatus>,
}

/// `GET /lost-items`
pub async fn list<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  _actor: Actor,
  ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Envelope<Vec<LostItem>>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::list(wf.lost_items(params.status).await?))
}

/// `POST /lost-items`
pub async fn report<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiJson(body): ApiJson<NewLostItem>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let item = wf.report_item(&actor, body).await?;
  Ok((
    StatusCode::CREATED,
    Envelope::data(item).message("Lost item reported successfully"),
  ))
}

/// `GET /lost-items/:id`
pub async fn get_one<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  _actor: Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<LostItem>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  Ok(Envelope::data(wf.lost_item(id).await?))
}

/// `DELETE /lost-items/:id`
pub async fn delete<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<Value>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  wf.delete_item(&actor, id).await?;
  Ok(Envelope::data(json!({ "id": id })).message("Lost item deleted"))
}

/// `POST /lost-items/:id/claim`
pub async fn claim<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<LostItem>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let item = wf.request_claim(&actor, id).await?;
  Ok(Envelope::data(item).message("Claim request submitted. Waiting for admin approval"))
}

/// `POST /lost-items/:id/approve`
pub async fn approve<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
) -> Result<Envelope<LostItem>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let item = wf.approve_claim(&actor, id).await?;
  Ok(Envelope::data(item).message("Claim approved"))
}

/// `POST /lost-items/:id/reject`
pub async fn reject<S, B>(
  State(wf): State<Arc<Workflow<S, B>>>,
  Actor(actor): Actor,
  ApiPath(id): ApiPath<Uuid>,
  body: Bytes,
) -> Result<Envelope<LostItem>, ApiError>
where
  S: PortalStore,
  B: Broadcaster,
{
  let reason = reason_from_body(&body)?;
  let item = wf.reject_claim(&actor, id, reason).await?;
  Ok(Envelope::data(item).message("Claim rejected"))
}
