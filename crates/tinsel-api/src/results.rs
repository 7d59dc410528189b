//! `GET /groups/{id}/results`: the full pairing list, public once the event
//! date has arrived.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::Utc;
use tinsel_core::{group::Pairing, notify::Notifier, store::GroupStore};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn handler<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Pairing>>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let today = Utc::now().date_naive();
  Ok(Json(state.exchange.results(id, today).await?))
}
