//! Tinsel server wiring: configuration, the mail notifier and the HTTP app.
//!
//! The `tinsel` binary in `main.rs` is a thin shell over [`ServerConfig`] and
//! [`app`].

pub mod mail;

use std::{path::PathBuf, time::Duration};

use axum::Router;
use serde::Deserialize;
use tinsel_api::{AppState, OrganizerAccount, OrganizerDirectory, api_router};
use tinsel_core::{exchange::{Exchange, ExchangeConfig}, notify::Notifier, store::GroupStore};
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TINSEL__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// Public origin used in join links.
  #[serde(default = "default_base_url")]
  pub base_url:           String,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default)]
  pub organizers:         Vec<OrganizerAccount>,
  #[serde(default)]
  pub mail:               MailConfig,
  #[serde(default)]
  pub timeouts:           TimeoutConfig,
  #[serde(default = "default_notify_concurrency")]
  pub notify_concurrency: usize,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_base_url() -> String { "http://localhost:8080".into() }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/tinsel/tinsel.db") }

fn default_notify_concurrency() -> usize { 4 }

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
  pub api_url:    String,
  /// Without a key, notices are logged rather than sent.
  pub api_key:    Option<String>,
  pub from_email: String,
  pub from_name:  String,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      api_url:    "https://api.mailersend.com/v1/email".into(),
      api_key:    None,
      from_email: "noreply@tinsel.local".into(),
      from_name:  "Tinsel".into(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub store_ms:  u64,
  pub notify_ms: u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self { Self { store_ms: 10_000, notify_ms: 15_000 } }
}

impl ServerConfig {
  pub fn exchange_config(&self) -> ExchangeConfig {
    ExchangeConfig {
      store_timeout:      Duration::from_millis(self.timeouts.store_ms),
      notify_timeout:     Duration::from_millis(self.timeouts.notify_ms),
      notify_concurrency: self.notify_concurrency.max(1),
    }
  }

  pub fn notify_timeout(&self) -> Duration { Duration::from_millis(self.timeouts.notify_ms) }

  pub fn directory(&self) -> OrganizerDirectory { OrganizerDirectory::new(self.organizers.clone()) }
}

// ─── App ─────────────────────────────────────────────────────────────────────

/// The full HTTP application: API routes plus request tracing.
pub fn app<S, N>(config: &ServerConfig, store: S, notifier: N) -> Router
where
  S: GroupStore + 'static,
  N: Notifier + 'static,
{
  let exchange = Exchange::new(store, notifier, config.exchange_config());
  let state = AppState::new(exchange, config.directory(), &config.base_url);
  api_router(state).layer(TraceLayer::new_for_http())
}
