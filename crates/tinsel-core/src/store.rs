//! The `GroupStore` trait and its conditional-write result type.
//!
//! The trait is implemented by storage backends (e.g. `tinsel-store-sqlite`).
//! Higher layers depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  group::{AssignmentMap, Group, GroupStatus},
  notify::{DeliveryOutcome, DeliveryRecord},
  participant::Participant,
};

// ─── Write outcome ───────────────────────────────────────────────────────────

/// Result of a write whose precondition is checked atomically with the write.
///
/// Anything other than `Applied` means nothing was changed.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
  Applied(T),
  NotFound,
  /// The group was not in a status the transition allows.
  WrongStatus(GroupStatus),
  /// Another participant already uses this email (case-insensitive).
  DuplicateEmail(String),
  /// The participant list no longer matches what the caller read.
  Stale,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a group document store.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait GroupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Groups ────────────────────────────────────────────────────────────

  /// Persist a new group. The group is validated before it is written.
  fn create_group(
    &self,
    group: Group,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  /// Retrieve a group by id. Returns `None` if not found.
  fn get_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// All groups created by `organizer_id`, newest first.
  fn list_by_organizer<'a>(
    &'a self,
    organizer_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + 'a;

  /// Remove a group and everything hanging off it. Returns `false` if it did
  /// not exist.
  fn delete_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Conditional transitions ───────────────────────────────────────────

  /// Append a participant, provided the group is still `open` and the email
  /// is not taken.
  fn add_participant(
    &self,
    id: Uuid,
    participant: Participant,
  ) -> impl Future<Output = Result<WriteOutcome<Group>, Self::Error>> + Send + '_;

  /// Store the assignment map and move the group `open → drawn`.
  ///
  /// Rejected with [`WriteOutcome::WrongStatus`] if the group is no longer
  /// `open`, and with [`WriteOutcome::Stale`] if its participants differ from
  /// the keys of `assignments`.
  fn commit_draw(
    &self,
    id: Uuid,
    assignments: AssignmentMap,
    drawn_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<WriteOutcome<Group>, Self::Error>> + Send + '_;

  /// Move the group `open | drawn → closed`.
  fn close_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<WriteOutcome<Group>, Self::Error>> + Send + '_;

  // ── Delivery state ────────────────────────────────────────────────────

  /// Record the latest send attempt for one recipient.
  fn record_delivery(
    &self,
    id: Uuid,
    outcome: DeliveryOutcome,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<DeliveryRecord, Self::Error>> + Send + '_;

  /// Latest delivery state per recipient, ordered by email.
  fn list_deliveries(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<DeliveryRecord>, Self::Error>> + Send + '_;
}
