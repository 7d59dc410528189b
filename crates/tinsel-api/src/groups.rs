//! Handlers for `/groups` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/groups` | The caller's groups, newest first |
//! | `POST`   | `/groups` | Body: [`NewGroup`]; 201 |
//! | `GET`    | `/groups/{id}` | Includes the shareable `join_link` |
//! | `DELETE` | `/groups/{id}` | 204 |
//! | `POST`   | `/groups/{id}/close` | `open \| drawn → closed` |
//!
//! The organizer view never includes the assignment map or participants'
//! hint answers; those surface only through notifications and results.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tinsel_core::{
  group::{Group, GroupMode, GroupStatus, NewGroup},
  notify::Notifier,
  store::GroupStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Organizer, error::ApiError};

// ─── View ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ParticipantView {
  pub name:         String,
  pub email:        String,
  pub is_organizer: bool,
  pub joined_at:    DateTime<Utc>,
}

/// What an organizer sees of one of their groups.
#[derive(Debug, Serialize)]
pub struct GroupView {
  pub group_id:        Uuid,
  pub name:            String,
  pub welcome_message: Option<String>,
  pub budget:          f64,
  pub event_date:      NaiveDate,
  pub mode:            GroupMode,
  pub status:          GroupStatus,
  pub hint_questions:  Vec<String>,
  pub participants:    Vec<ParticipantView>,
  pub created_at:      DateTime<Utc>,
  pub drawn_at:        Option<DateTime<Utc>>,
  pub join_link:       String,
}

impl GroupView {
  pub fn new(group: Group, base_url: &str) -> Self {
    Self {
      join_link:       format!("{base_url}/join/{}", group.group_id),
      group_id:        group.group_id,
      name:            group.name,
      welcome_message: group.welcome_message,
      budget:          group.budget,
      event_date:      group.event_date,
      mode:            group.mode,
      status:          group.status,
      hint_questions:  group.hint_questions,
      participants:    group
        .participants
        .into_iter()
        .map(|p| ParticipantView {
          name:         p.name,
          email:        p.email,
          is_organizer: p.is_organizer,
          joined_at:    p.joined_at,
        })
        .collect(),
      created_at:      group.created_at,
      drawn_at:        group.drawn_at,
    }
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /groups`
pub async fn list<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
) -> Result<Json<Vec<GroupView>>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let groups = state.exchange.list_groups(&session).await?;
  Ok(Json(groups.into_iter().map(|g| GroupView::new(g, &state.base_url)).collect()))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /groups`
pub async fn create<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Json(body): Json<NewGroup>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let group = state.exchange.create_group(&session, body).await?;
  Ok((StatusCode::CREATED, Json(GroupView::new(group, &state.base_url))))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /groups/{id}`
pub async fn get_one<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<Json<GroupView>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let group = state.exchange.group(&session, id).await?;
  Ok(Json(GroupView::new(group, &state.base_url)))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /groups/{id}`
pub async fn delete_one<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  state.exchange.delete(&session, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Close ───────────────────────────────────────────────────────────────────

/// `POST /groups/{id}/close`
pub async fn close<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<Json<GroupView>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let group = state.exchange.close(&session, id).await?;
  Ok(Json(GroupView::new(group, &state.base_url)))
}
