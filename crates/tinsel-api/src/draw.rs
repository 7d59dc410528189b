//! Handlers for the draw and its notifications.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/groups/{id}/draw` | Commit the draw, then notify everyone |
//! | `GET`  | `/groups/{id}/notifications` | Latest delivery state per recipient |
//! | `POST` | `/groups/{id}/notifications` | Notify every participant again |
//! | `POST` | `/groups/{id}/notifications/resend` | Body: `{"email"}` |
//!
//! Delivery failures never fail the request; they are listed in `outcomes`.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tinsel_core::{
  notify::{DeliveryOutcome, DeliveryRecord, DeliveryReport, Notifier},
  store::GroupStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Organizer, error::ApiError, groups::GroupView};

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DeliverySummary {
  pub delivered: usize,
  pub failed:    usize,
  pub outcomes:  Vec<DeliveryOutcome>,
}

impl From<DeliveryReport> for DeliverySummary {
  fn from(report: DeliveryReport) -> Self {
    Self {
      delivered: report.succeeded(),
      failed:    report.failed(),
      outcomes:  report.outcomes,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct DrawResponse {
  pub group:         GroupView,
  #[serde(flatten)]
  pub notifications: DeliverySummary,
}

// ─── Draw ────────────────────────────────────────────────────────────────────

/// `POST /groups/{id}/draw`
pub async fn run<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<Json<DrawResponse>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let outcome = state.exchange.draw(&session, id).await?;
  Ok(Json(DrawResponse {
    group:         GroupView::new(outcome.group, &state.base_url),
    notifications: outcome.report.into(),
  }))
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// `GET /groups/{id}/notifications`
pub async fn deliveries<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryRecord>>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  Ok(Json(state.exchange.deliveries(&session, id).await?))
}

/// `POST /groups/{id}/notifications`
pub async fn notify_all<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
) -> Result<Json<DeliverySummary>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  let report = state.exchange.notify_all(&session, id).await?;
  Ok(Json(report.into()))
}

#[derive(Debug, Deserialize)]
pub struct ResendBody {
  pub email: String,
}

/// `POST /groups/{id}/notifications/resend`
pub async fn resend<S, N>(
  State(state): State<AppState<S, N>>,
  Organizer(session): Organizer,
  Path(id): Path<Uuid>,
  Json(body): Json<ResendBody>,
) -> Result<Json<DeliveryOutcome>, ApiError>
where
  S: GroupStore,
  N: Notifier,
{
  Ok(Json(state.exchange.resend(&session, id, &body.email).await?))
}
