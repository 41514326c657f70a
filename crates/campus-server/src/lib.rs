//! HTTP and realtime front end for the campus portal.
//!
//! Wires a [`PortalStore`] and the realtime [`Registry`] into a
//! [`Workflow`], then exposes the JSON API under `/api` and the realtime
//! channel at `/ws`.

pub mod auth;
pub mod realtime;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
  middleware,
  routing::{get, post},
};
use campus_core::{ClaimWriteMode, Workflow, store::PortalStore};
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};
use tracing::warn;

use auth::TokenKeys;
use realtime::Registry;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CAMPUS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  pub store_path:       PathBuf,
  pub jwt_secret:       String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours:  i64,
  /// Frontend origins allowed for CORS and the realtime upgrade.
  #[serde(default)]
  pub allowed_origins:  Vec<String>,
  #[serde(default)]
  pub claim_write_mode: ClaimWriteMode,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 5000 }

fn default_token_ttl_hours() -> i64 { 24 }

impl ServerConfig {
  pub fn origin_allowed(&self, origin: &str) -> bool {
    let origin = origin.trim_end_matches('/');
    self
      .allowed_origins
      .iter()
      .any(|o| o.trim_end_matches('/') == origin)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the auth and realtime handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub workflow: Arc<Workflow<S, Registry>>,
  pub registry: Arc<Registry>,
  pub tokens:   Arc<TokenKeys>,
  pub config:   Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      workflow: self.workflow.clone(),
      registry: self.registry.clone(),
      tokens:   self.tokens.clone(),
      config:   self.config.clone(),
    }
  }
}

impl<S: PortalStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let store = Arc::new(store);
    let registry = Arc::new(Registry::new());
    let workflow = Workflow::new(store.clone(), registry.clone())
      .with_claim_mode(config.claim_write_mode);
    Self {
      store,
      workflow: Arc::new(workflow),
      registry,
      tokens: Arc::new(TokenKeys::new(&config.jwt_secret, config.token_ttl_hours)),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: PortalStore + 'static,
{
  let authenticated =
    middleware::from_fn_with_state(state.tokens.clone(), auth::require_identity);

  let accounts: Router = Router::new()
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .route(
      "/auth/me",
      get(auth::me::<S>).route_layer(authenticated.clone()),
    )
    .with_state(state.clone());

  let api = campus_api::api_router(state.workflow.clone()).route_layer(authenticated);

  let ws: Router = Router::new()
    .route("/ws", get(realtime::upgrade::<S>))
    .with_state(state.clone());

  Router::new()
    .nest("/api", accounts.merge(api))
    .merge(ws)
    .layer(cors_layer(&state.config.allowed_origins))
    .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o.trim_end_matches('/')) {
      Ok(v) if o != "*" => Some(v),
      _ => {
        warn!(origin = %o, "ignoring unusable allowed origin");
        None
      }
    })
    .collect();

  CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
