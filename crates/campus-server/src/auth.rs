//! Accounts, password hashing and bearer tokens.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/auth/register` | `{name, email, password, role?}`; `admin` is refused |
//! | `POST` | `/api/auth/login` | `{email, password}` |
//! | `GET`  | `/api/auth/me` | Bearer token required |
//!
//! Tokens are HS256 JWTs carrying the user id and role. The same token is
//! accepted as `Authorization: Bearer` on API calls and as `?token=` on the
//! realtime upgrade.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use campus_api::{ApiError, Envelope, extract::{Actor, ApiJson}};
use campus_core::{
  Identity, Role,
  store::PortalStore,
  user::{NewUser, User, normalize_email},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::AppState;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("password hashing failed: {0}")]
  Hash(String),
  #[error("token error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),
}

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash).is_ok_and(|parsed| {
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:  Uuid,
  pub role: Role,
  pub iat:  i64,
  pub exp:  i64,
}

/// Signing and verification keys derived from the configured secret.
pub struct TokenKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl:      Duration,
}

impl TokenKeys {
  pub fn new(secret: &str, ttl_hours: i64) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl:      Duration::hours(ttl_hours),
    }
  }

  pub fn issue(&self, user: &User) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
      sub:  user.user_id,
      role: user.role,
      iat:  now.timestamp(),
      exp:  (now + self.ttl).timestamp(),
    };
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
  }

  /// Check signature and expiry, returning the identity the token names.
  pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
    let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
    Ok(Identity::new(data.claims.sub, data.claims.role))
  }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// Middleware: verify the bearer token and attach the caller's [`Identity`].
pub async fn require_identity(
  State(keys): State<Arc<TokenKeys>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let token = bearer_token(req.headers()).ok_or(ApiError::Unauthenticated)?;
  let identity = keys.verify(token).map_err(|_| ApiError::Unauthenticated)?;
  req.extensions_mut().insert(identity);
  Ok(next.run(req).await)
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub name:     String,
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub role:     Option<Role>,
}

/// Validate, hash and persist a new account. Any role is accepted here;
/// callers decide which roles they allow.
pub async fn create_account<S: PortalStore>(
  store: &S,
  input: Registration,
) -> Result<User, ApiError> {
  let name = input.name.trim().to_owned();
  if name.is_empty() {
    return Err(campus_core::Error::Validation("Name is required".into()).into());
  }
  let email = normalize_email(&input.email);
  if !email.contains('@') {
    return Err(campus_core::Error::Validation("A valid email is required".into()).into());
  }
  if input.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(
      campus_core::Error::Validation(format!(
        "Password must be at least {MIN_PASSWORD_LEN} characters"
      ))
      .into(),
    );
  }

  let password_hash = hash_password(&input.password).map_err(ApiError::store)?;
  let user = store
    .add_user(NewUser { name, email, role: input.role.unwrap_or_default(), password_hash })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::from(campus_core::Error::Conflict(
        "An account with this email already exists".into(),
      ))
    })?;

  info!(user_id = %user.user_id, role = %user.role, "account created");
  Ok(user)
}

#[derive(Debug, Serialize)]
pub struct Session {
  pub user:  User,
  pub token: String,
}

fn session<S: PortalStore>(state: &AppState<S>, user: User) -> Result<Session, ApiError> {
  let token = state.tokens.issue(&user).map_err(ApiError::store)?;
  Ok(Session { user, token })
}

/// `POST /api/auth/register`
pub async fn register<S: PortalStore + 'static>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<Registration>,
) -> Result<impl IntoResponse, ApiError> {
  if body.role.is_some_and(|r| r.is_admin()) {
    return Err(ApiError::Forbidden("Admin accounts cannot be self-registered".into()));
  }
  let user = create_account(state.store.as_ref(), body).await?;
  Ok((
    StatusCode::CREATED,
    Envelope::data(session(&state, user)?).message("Registered successfully"),
  ))
}

#[derive(Debug, Deserialize)]
pub struct Login {
  pub email:    String,
  pub password: String,
}

/// `POST /api/auth/login`
pub async fn login<S: PortalStore + 'static>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<Login>,
) -> Result<Envelope<Session>, ApiError> {
  let email = normalize_email(&body.email);
  let user = state
    .store
    .find_user_by_email(&email)
    .await
    .map_err(ApiError::store)?
    .filter(|u| verify_password(&body.password, &u.password_hash))
    .ok_or(ApiError::InvalidCredentials)?;

  Ok(Envelope::data(session(&state, user)?))
}

/// `GET /api/auth/me`
pub async fn me<S: PortalStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
) -> Result<Envelope<User>, ApiError> {
  let user = state
    .store
    .get_user(actor.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
  Ok(Envelope::data(user))
}
