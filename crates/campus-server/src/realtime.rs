//! Realtime fan-out over WebSockets.
//!
//! Each open socket is registered in a [`Registry`] under its user id and
//! role. Workflow notifications are routed to every socket, to the sockets
//! of one role, or to the sockets of one user. Clients may also join ad-hoc
//! topics with `{"action":"join","topic":"..."}`, up to [`MAX_TOPICS`] per
//! socket. Topic membership is client-managed; workflow notifications never
//! target a topic.
//!
//! Outbound frames are JSON text: `{"event": <name>, "data": <payload>}`.
//! Each connection owns a queue of [`OUTBOUND_QUEUE`] frames and publishers
//! never wait on it. A frame for a full queue or a closed socket is dropped.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use axum::{
  extract::{
    Query, State,
    ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
  },
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};
use campus_api::ApiError;
use campus_core::{
  Identity, Role,
  notify::{Broadcaster, Notification},
  store::PortalStore,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{
  RwLock,
  mpsc::{self, error::TrySendError},
};
use tracing::debug;
use uuid::Uuid;

use crate::AppState;

pub type ConnectionId = u64;

/// Frames buffered per socket before further frames are dropped.
pub const OUTBOUND_QUEUE: usize = 256;

/// Topics a single socket may hold at once.
pub const MAX_TOPICS: usize = 64;

#[derive(Debug, Error)]
pub enum RealtimeError {
  #[error("failed to encode frame: {0}")]
  Encode(#[from] serde_json::Error),
}

struct Connection {
  user_id: Uuid,
  role:    Role,
  topics:  HashSet<String>,
  tx:      mpsc::Sender<String>,
}

/// The set of open realtime channels.
#[derive(Default)]
pub struct Registry {
  next_id:     AtomicU64,
  connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  /// Add a channel for `identity`. Frames routed to it arrive on the
  /// returned receiver.
  pub async fn register(
    &self,
    identity: Identity,
  ) -> (ConnectionId, mpsc::Receiver<String>) {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    self.connections.write().await.insert(id, Connection {
      user_id: identity.user_id,
      role: identity.role,
      topics: HashSet::new(),
      tx,
    });
    (id, rx)
  }

  pub async fn unregister(&self, id: ConnectionId) {
    self.connections.write().await.remove(&id);
  }

  #[cfg(test)]
  pub(crate) async fn connection_count(&self) -> usize { self.connections.read().await.len() }

  /// Returns false if the connection is unknown or already holds
  /// [`MAX_TOPICS`] other topics.
  pub async fn join_topic(&self, id: ConnectionId, topic: String) -> bool {
    match self.connections.write().await.get_mut(&id) {
      Some(conn) if conn.topics.contains(&topic) => true,
      Some(conn) if conn.topics.len() >= MAX_TOPICS => {
        debug!(connection = id, %topic, "topic limit reached");
        false
      }
      Some(conn) => conn.topics.insert(topic),
      None => false,
    }
  }

  pub async fn leave_topic(&self, id: ConnectionId, topic: &str) -> bool {
    match self.connections.write().await.get_mut(&id) {
      Some(conn) => conn.topics.remove(topic),
      None => false,
    }
  }

  /// Deliver to every channel that joined `topic`. Returns how many channels
  /// accepted the frame.
  #[cfg(test)]
  pub(crate) async fn publish_topic(
    &self,
    topic: &str,
    notification: &Notification,
  ) -> Result<usize, RealtimeError> {
    self.send_where(notification, |c| c.topics.contains(topic)).await
  }

  async fn send_where(
    &self,
    notification: &Notification,
    matches: impl Fn(&Connection) -> bool + Send,
  ) -> Result<usize, RealtimeError> {
    let frame = serde_json::to_string(notification)?;
    let connections = self.connections.read().await;
    let mut delivered = 0;
    for (id, conn) in connections.iter().filter(|(_, c)| matches(c)) {
      match conn.tx.try_send(frame.clone()) {
        Ok(()) => delivered += 1,
        Err(TrySendError::Full(_)) => {
          debug!(connection = id, event = %notification.event, "frame dropped for full queue");
        }
        Err(TrySendError::Closed(_)) => {
          debug!(connection = id, event = %notification.event, "frame dropped for closed channel");
        }
      }
    }
    Ok(delivered)
  }
}

impl Broadcaster for Registry {
  type Error = RealtimeError;

  async fn broadcast_all(&self, notification: Notification) -> Result<(), Self::Error> {
    self.send_where(&notification, |_| true).await.map(drop)
  }

  async fn notify_role(&self, role: Role, notification: Notification) -> Result<(), Self::Error> {
    self.send_where(&notification, |c| c.role == role).await.map(drop)
  }

  async fn notify_user(
    &self,
    user_id: Uuid,
    notification: Notification,
  ) -> Result<(), Self::Error> {
    self
      .send_where(&notification, |c| c.user_id == user_id)
      .await
      .map(drop)
  }
}

// ─── WebSocket endpoint ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
  pub token: Option<String>,
}

/// `GET /ws?token=<jwt>`
///
/// Refuses with 401 when the token is missing or invalid, and with 403 when
/// the browser's `Origin` is not on the allowlist.
pub async fn upgrade<S: PortalStore + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<ConnectParams>,
  headers: HeaderMap,
  ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
  let Some(identity) = params
    .token
    .as_deref()
    .and_then(|t| state.tokens.verify(t).ok())
  else {
    return ApiError::Unauthenticated.into_response();
  };

  if let Some(origin) = headers.get(header::ORIGIN) {
    let allowed = origin
      .to_str()
      .is_ok_and(|o| state.config.origin_allowed(o));
    if !allowed {
      debug!(?origin, "realtime upgrade from disallowed origin");
      return ApiError::Forbidden("Origin not allowed".into()).into_response();
    }
  }

  let ws = match ws {
    Ok(ws) => ws,
    Err(rejection) => return rejection.into_response(),
  };
  let registry = state.registry.clone();
  ws.on_upgrade(move |socket| serve_socket(socket, registry, identity))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum Inbound {
  Join { topic: String },
  Leave { topic: String },
}

async fn serve_socket(mut socket: WebSocket, registry: Arc<Registry>, identity: Identity) {
  let (id, mut rx) = registry.register(identity).await;
  debug!(connection = id, user_id = %identity.user_id, role = %identity.role, "realtime client connected");

  loop {
    tokio::select! {
      frame = rx.recv() => match frame {
        Some(text) => {
          if socket.send(Message::Text(text.into())).await.is_err() {
            break;
          }
        }
        None => break,
      },
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(text))) => handle_inbound(&registry, id, text.as_str()).await,
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => {}
        Some(Err(e)) => {
          debug!(connection = id, error = %e, "realtime socket error");
          break;
        }
      },
    }
  }

  registry.unregister(id).await;
  debug!(connection = id, user_id = %identity.user_id, "realtime client disconnected");
}

async fn handle_inbound(registry: &Registry, id: ConnectionId, text: &str) {
  match serde_json::from_str::<Inbound>(text) {
    Ok(Inbound::Join { topic }) => {
      registry.join_topic(id, topic).await;
    }
    Ok(Inbound::Leave { topic }) => {
      registry.leave_topic(id, &topic).await;
    }
    Err(e) => debug!(connection = id, error = %e, "ignoring malformed realtime frame"),
  }
}
