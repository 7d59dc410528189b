//! JSON REST API for Tinsel.
//!
//! Exposes an axum [`Router`] over an [`Exchange`] backed by any
//! [`GroupStore`] and [`Notifier`]. Organizer routes require HTTP Basic auth;
//! the invitation, join and results routes are public. TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tinsel_api::api_router(state))
//! ```

pub mod auth;
pub mod draw;
pub mod error;
pub mod groups;
pub mod participants;
pub mod results;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tinsel_core::{exchange::Exchange, notify::Notifier, store::GroupStore};

pub use auth::{Organizer, OrganizerAccount, OrganizerDirectory};
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, N> {
  pub exchange:  Arc<Exchange<S, N>>,
  pub directory: Arc<OrganizerDirectory>,
  /// Public origin used to build join links, without a trailing slash.
  pub base_url:  Arc<str>,
}

impl<S, N> AppState<S, N> {
  pub fn new(exchange: Exchange<S, N>, directory: OrganizerDirectory, base_url: &str) -> Self {
    Self {
      exchange:  Arc::new(exchange),
      directory: Arc::new(directory),
      base_url:  Arc::from(base_url.trim_end_matches('/')),
    }
  }
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      exchange:  Arc::clone(&self.exchange),
      directory: Arc::clone(&self.directory),
      base_url:  Arc::clone(&self.base_url),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(state: AppState<S, N>) -> Router<()>
where
  S: GroupStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    // Groups (organizer)
    .route("/groups", get(groups::list::<S, N>).post(groups::create::<S, N>))
    .route("/groups/{id}", get(groups::get_one::<S, N>).delete(groups::delete_one::<S, N>))
    .route("/groups/{id}/close", post(groups::close::<S, N>))
    // Joining (public)
    .route("/groups/{id}/invitation", get(participants::invitation::<S, N>))
    .route("/groups/{id}/participants", post(participants::join::<S, N>))
    // Draw and notifications (organizer)
    .route("/groups/{id}/draw", post(draw::run::<S, N>))
    .route(
      "/groups/{id}/notifications",
      get(draw::deliveries::<S, N>).post(draw::notify_all::<S, N>),
    )
    .route("/groups/{id}/notifications/resend", post(draw::resend::<S, N>))
    // Results (public, date-gated)
    .route("/groups/{id}/results", get(results::handler::<S, N>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
