//! Error types for `tinsel-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::group::GroupStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("need at least 2 participants to draw, found {found}")]
  InsufficientParticipants { found: usize },

  #[error("group {0} was drawn by a concurrent request; the committed draw was kept")]
  ConcurrentDrawConflict(Uuid),

  #[error("{0} is already registered for this group")]
  DuplicateParticipant(String),

  #[error("group not found: {0}")]
  GroupNotFound(Uuid),

  #[error("group {id} is {status}, not open")]
  GroupNotOpen { id: Uuid, status: GroupStatus },

  #[error("group {0} is already closed")]
  AlreadyClosed(Uuid),

  #[error("participant not found: {0}")]
  ParticipantNotFound(String),

  #[error("group {0} has not been drawn yet")]
  NotDrawn(Uuid),

  #[error("results are available from {0}")]
  ResultsNotYetAvailable(NaiveDate),

  #[error("invalid assignment: {0}")]
  InvalidAssignment(String),

  #[error("invalid input: {0}")]
  Invalid(String),

  #[error("only the group organizer may do this")]
  Forbidden,

  /// A store answered with an outcome the transition cannot produce.
  #[error("internal error: {0}")]
  Internal(String),

  #[error("{0} timed out")]
  Timeout(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
