//! Draw-result emails.
//!
//! [`MailerSend`] posts each notice to the MailerSend transactional email API.
//! [`TracingNotifier`] only logs; it stands in when no API key is configured.
//! [`Mailer`] picks one of the two from [`MailConfig`].

use std::{convert::Infallible, fmt::Write as _, time::Duration};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tinsel_core::{
  group::{GroupMode, GroupSummary},
  notify::{DeliveryError, DrawNotice, MatchReveal, Notifier},
};
use tracing::{debug, info};

use crate::MailConfig;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MailError {
  #[error("mail transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("mail provider rejected the message ({status}): {message}")]
  Rejected { status: u16, message: String },
}

impl DeliveryError for MailError {
  fn is_retryable(&self) -> bool {
    match self {
      MailError::Transport(_) => true,
      MailError::Rejected { status, .. } => {
        *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
      }
    }
  }
}

// ─── MailerSend ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Address<'a> {
  email: &'a str,
  name:  &'a str,
}

#[derive(Serialize)]
struct Message<'a> {
  from:    Address<'a>,
  to:      [Address<'a>; 1],
  subject: String,
  text:    String,
  html:    String,
}

#[derive(Deserialize)]
struct ProviderError {
  message: Option<String>,
}

/// Sends one email per notice through the MailerSend HTTP API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct MailerSend {
  client:     Client,
  api_url:    String,
  api_key:    String,
  from_email: String,
  from_name:  String,
}

impl MailerSend {
  pub fn new(config: &MailConfig, api_key: &str, timeout: Duration) -> Result<Self, MailError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      api_url:    config.api_url.clone(),
      api_key:    api_key.to_owned(),
      from_email: config.from_email.clone(),
      from_name:  config.from_name.clone(),
    })
  }
}

impl Notifier for MailerSend {
  type Error = MailError;

  async fn send(&self, notice: DrawNotice) -> Result<(), MailError> {
    let message = Message {
      from:    Address { email: &self.from_email, name: &self.from_name },
      to:      [Address { email: &notice.recipient.email, name: &notice.recipient.name }],
      subject: render_subject(&notice),
      text:    render_text(&notice),
      html:    render_html(&notice),
    };

    let resp = self
      .client
      .post(&self.api_url)
      .bearer_auth(&self.api_key)
      .json(&message)
      .send()
      .await?;

    let status = resp.status();
    if status.is_success() {
      debug!(email = %notice.recipient.email, group_id = %notice.group.group_id, "draw email accepted");
      return Ok(());
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderError>(&body)
      .ok()
      .and_then(|e| e.message)
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned());
    Err(MailError::Rejected { status: status.as_u16(), message })
  }
}

// ─── Tracing fallback ────────────────────────────────────────────────────────

/// Logs each notice instead of sending it.
#[derive(Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  type Error = Infallible;

  async fn send(&self, notice: DrawNotice) -> Result<(), Infallible> {
    info!(
      email = %notice.recipient.email,
      group_id = %notice.group.group_id,
      subject = %render_subject(&notice),
      "mail delivery disabled; notice logged only"
    );
    debug!(body = %render_text(&notice));
    Ok(())
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The notifier the server runs with.
#[derive(Clone)]
pub enum Mailer {
  MailerSend(MailerSend),
  Tracing(TracingNotifier),
}

impl Mailer {
  /// MailerSend when an API key is configured, otherwise log-only.
  pub fn from_config(config: &MailConfig, timeout: Duration) -> Result<Self, MailError> {
    match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
      Some(key) => Ok(Mailer::MailerSend(MailerSend::new(config, key, timeout)?)),
      None => Ok(Mailer::Tracing(TracingNotifier)),
    }
  }

  pub fn is_live(&self) -> bool { matches!(self, Mailer::MailerSend(_)) }
}

impl Notifier for Mailer {
  type Error = MailError;

  async fn send(&self, notice: DrawNotice) -> Result<(), MailError> {
    match self {
      Mailer::MailerSend(m) => m.send(notice).await,
      Mailer::Tracing(t) => match t.send(notice).await {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
    }
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

pub fn render_subject(notice: &DrawNotice) -> String {
  format!("Secret Santa draw results - {}", notice.group.name)
}

fn event_details(group: &GroupSummary) -> [(&'static str, String); 3] {
  [
    ("Event date", group.event_date.format("%A, %B %-d, %Y").to_string()),
    ("Budget", format!("${:.2}", group.budget)),
    (
      "Mode",
      match group.mode {
        GroupMode::Standard => "Standard".to_owned(),
        GroupMode::Hint => "Hints".to_owned(),
      },
    ),
  ]
}

pub fn render_text(notice: &DrawNotice) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Hi {},", notice.recipient.name);
  let _ = writeln!(out);
  let _ = writeln!(out, "The Secret Santa draw for {} is done.", notice.group.name);
  let _ = writeln!(out);

  match &notice.reveal {
    MatchReveal::Direct(m) => {
      let _ = writeln!(out, "You are buying a gift for: {}", m.name);
    }
    MatchReveal::Hints(hints) if hints.is_empty() => {
      let _ = writeln!(out, "Your match left no hints. Good luck!");
    }
    MatchReveal::Hints(hints) => {
      let _ = writeln!(out, "Your match is a mystery. Here is what they told us:");
      for hint in hints {
        let _ = writeln!(out, "- {} {}", hint.question, hint.answer);
      }
    }
  }
  let _ = writeln!(out);

  for (label, value) in event_details(&notice.group) {
    let _ = writeln!(out, "{label}: {value}");
  }
  if let Some(msg) = &notice.group.welcome_message {
    let _ = writeln!(out);
    let _ = writeln!(out, "Message from the organizer:");
    let _ = writeln!(out, "{msg}");
  }
  let _ = writeln!(out);
  let _ = write!(out, "Happy gift giving!");
  out
}

pub fn render_html(notice: &DrawNotice) -> String {
  let mut out = String::from("<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>");
  let _ = write!(
    out,
    "<h1>Secret Santa draw complete!</h1><p>Hi <strong>{}</strong>,</p>\
     <p>The Secret Santa draw for <strong>{}</strong> is done.</p>",
    escape(&notice.recipient.name),
    escape(&notice.group.name),
  );

  match &notice.reveal {
    MatchReveal::Direct(m) => {
      let _ = write!(out, "<p>You are buying a gift for:</p><h2>{}</h2>", escape(&m.name));
    }
    MatchReveal::Hints(hints) if hints.is_empty() => {
      out.push_str("<p>Your match left no hints. Good luck!</p>");
    }
    MatchReveal::Hints(hints) => {
      out.push_str("<p>Your match is a mystery. Here is what they told us:</p><ul>");
      for hint in hints {
        let _ = write!(
          out,
          "<li><strong>{}</strong> {}</li>",
          escape(&hint.question),
          escape(&hint.answer)
        );
      }
      out.push_str("</ul>");
    }
  }

  out.push_str("<h3>Event details</h3>");
  for (label, value) in event_details(&notice.group) {
    let _ = write!(out, "<p><strong>{label}:</strong> {}</p>", escape(&value));
  }
  if let Some(msg) = &notice.group.welcome_message {
    let _ = write!(out, "<h3>Message from the organizer</h3><p>{}</p>", escape(msg));
  }
  out.push_str("<p>Happy gift giving!</p></body></html>");
  out
}

fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
