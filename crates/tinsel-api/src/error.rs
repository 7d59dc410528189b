//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tinsel_core::Error as CoreError;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("timed out: {0}")]
  Timeout(String),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    let message = e.to_string();
    match e {
      CoreError::GroupNotFound(_) | CoreError::ParticipantNotFound(_) => {
        ApiError::NotFound(message)
      }
      CoreError::Invalid(_) => ApiError::BadRequest(message),
      CoreError::Forbidden | CoreError::ResultsNotYetAvailable(_) => ApiError::Forbidden(message),
      CoreError::InsufficientParticipants { .. }
      | CoreError::ConcurrentDrawConflict(_)
      | CoreError::DuplicateParticipant(_)
      | CoreError::GroupNotOpen { .. }
      | CoreError::AlreadyClosed(_)
      | CoreError::NotDrawn(_) => ApiError::Conflict(message),
      CoreError::Timeout(_) => ApiError::Timeout(message),
      CoreError::InvalidAssignment(_) | CoreError::Internal(_) => ApiError::Internal(message),
      CoreError::Store(e) => ApiError::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
      ApiError::Internal(m) => {
        error!(error = %m, "internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
      }
      ApiError::Store(e) => {
        error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"tinsel\""),
      );
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
      (CoreError::GroupNotFound(id), StatusCode::NOT_FOUND),
      (CoreError::Invalid("x".into()), StatusCode::BAD_REQUEST),
      (CoreError::Forbidden, StatusCode::FORBIDDEN),
      (CoreError::ConcurrentDrawConflict(id), StatusCode::CONFLICT),
      (CoreError::InsufficientParticipants { found: 1 }, StatusCode::CONFLICT),
      (CoreError::Timeout("commit draw"), StatusCode::GATEWAY_TIMEOUT),
      (CoreError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), status);
    }
  }

  #[test]
  fn unauthorized_carries_challenge() {
    let res = ApiError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
