//! Public handlers behind the shareable join link.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/groups/{id}/invitation` | Group details and hint questions |
//! | `POST` | `/groups/{id}/participants` | Body: `{"name","email","answers"}`; 201 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use tinsel_core::{
  group::Invitation,
  notify::Notifier,
  participant::JoinRequest,
  store::GroupStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /groups/{id}/invitation`
pub async fn invitation<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  Ok(Json(state.exchange.invitation(id).await?))
}

/// `POST /groups/{id}/participants`
pub async fn join<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
  Json(body): Json<JoinRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let participant = state.exchange.join(id, body).await?;
  Ok((StatusCode::CREATED, Json(participant)))
}
