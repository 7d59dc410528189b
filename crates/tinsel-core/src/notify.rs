//! The notification seam and per-recipient delivery bookkeeping.
//!
//! After a draw is committed every participant gets one [`DrawNotice`]. Sends
//! are independent: a failure is recorded as a [`DeliveryOutcome`] for that
//! recipient and never touches anyone else's send or the committed draw.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{group::GroupSummary, participant::Match};

// ─── Notice ──────────────────────────────────────────────────────────────────

/// One answered hint question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
  pub question: String,
  pub answer:   String,
}

/// What the recipient of a notice learns about their match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatchReveal {
  Direct(Match),
  Hints(Vec<Hint>),
}

/// A single draw-result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawNotice {
  pub group:     GroupSummary,
  /// The participant being notified.
  pub recipient: Match,
  pub reveal:    MatchReveal,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Errors raised by a [`Notifier`] know whether trying again could help.
pub trait DeliveryError: std::error::Error + Send + Sync + 'static {
  fn is_retryable(&self) -> bool { true }
}

impl DeliveryError for std::convert::Infallible {}

/// Delivers draw results to one participant at a time.
pub trait Notifier: Send + Sync {
  type Error: DeliveryError;

  fn send(&self, notice: DrawNotice) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
  Delivered,
  Failed { reason: String, retryable: bool },
}

/// The result of notifying one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
  pub email:  String,
  #[serde(flatten)]
  pub status: DeliveryStatus,
}

impl DeliveryOutcome {
  pub fn is_delivered(&self) -> bool { matches!(self.status, DeliveryStatus::Delivered) }
}

/// Aggregate result of a notification batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
  pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
  pub fn succeeded(&self) -> usize { self.outcomes.iter().filter(|o| o.is_delivered()).count() }

  pub fn failed(&self) -> usize { self.outcomes.len() - self.succeeded() }

  pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
    self.outcomes.iter().filter(|o| !o.is_delivered())
  }
}

/// Persisted delivery state for one recipient, as kept by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
  pub email:      String,
  #[serde(flatten)]
  pub status:     DeliveryStatus,
  /// Number of send attempts so far, including this one.
  pub attempts:   u32,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn outcome(email: &str, ok: bool) -> DeliveryOutcome {
    DeliveryOutcome {
      email:  email.into(),
      status: if ok {
        DeliveryStatus::Delivered
      } else {
        DeliveryStatus::Failed { reason: "boom".into(), retryable: true }
      },
    }
  }

  #[test]
  fn report_counts() {
    let report = DeliveryReport {
      outcomes: vec![outcome("a@x.io", true), outcome("b@x.io", false), outcome("c@x.io", true)],
    };
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures().next().unwrap().email, "b@x.io");
  }

  #[test]
  fn outcome_serializes_flat() {
    let json = serde_json::to_value(outcome("b@x.io", false)).unwrap();
    assert_eq!(json["email"], "b@x.io");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["retryable"], true);
  }
}
