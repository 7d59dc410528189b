//! Organizer accounts, HTTP Basic-auth verification and the [`Organizer`]
//! extractor.
//!
//! Organizers are configured up front; each carries an argon2 PHC hash. A
//! successful check yields the [`Session`] handed to the exchange.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use tinsel_core::session::{IdentityProvider, Session};

use crate::{AppState, error::ApiError};

/// One organizer allowed to create and run groups.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizerAccount {
  pub user_id:       String,
  pub email:         String,
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// The configured organizers, checked with argon2.
#[derive(Debug, Clone, Default)]
pub struct OrganizerDirectory {
  accounts: Vec<OrganizerAccount>,
}

impl OrganizerDirectory {
  pub fn new(accounts: Vec<OrganizerAccount>) -> Self { Self { accounts } }
}

impl IdentityProvider for OrganizerDirectory {
  fn authenticate(&self, username: &str, password: &str) -> Option<Session> {
    let account = self.accounts.iter().find(|a| a.username == username)?;
    let parsed_hash = PasswordHash::new(&account.password_hash).ok()?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed_hash)
      .ok()?;
    Some(Session { user_id: account.user_id.clone(), email: account.email.clone() })
  }
}

/// Present in a handler means the request came from an authenticated organizer.
pub struct Organizer(pub Session);

/// Verify Basic credentials from `headers` against `provider`.
pub fn verify_auth(headers: &HeaderMap, provider: &dyn IdentityProvider) -> Result<Session, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  provider
    .authenticate(username, password)
    .ok_or(ApiError::Unauthorized)
}

impl<S, N> FromRequestParts<AppState<S, N>> for Organizer
where
  S: Send + Sync,
  N: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, N>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, state.directory.as_ref()).map(Organizer)
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, header};
  use rand_core::OsRng;

  use super::*;

  fn directory(password: &str) -> OrganizerDirectory {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    OrganizerDirectory::new(vec![OrganizerAccount {
      user_id:       "org-1".into(),
      email:         "santa@example.com".into(),
      username:      "santa".into(),
      password_hash: hash,
    }])
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials_yield_session() {
    let dir = directory("secret");
    let session = verify_auth(&headers(&basic("santa", "secret")), &dir).unwrap();
    assert_eq!(session.user_id, "org-1");
    assert_eq!(session.email, "santa@example.com");
  }

  #[test]
  fn wrong_password() {
    let dir = directory("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("santa", "wrong")), &dir),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn unknown_user() {
    let dir = directory("secret");
    assert!(dir.authenticate("rudolph", "secret").is_none());
  }

  #[test]
  fn missing_or_garbled_header() {
    let dir = directory("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &dir), Err(ApiError::Unauthorized)));
    assert!(matches!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &dir),
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      verify_auth(&headers("Bearer abc"), &dir),
      Err(ApiError::Unauthorized)
    ));
  }
}
