//! The authenticated organizer and the identity seam that produces one.
//!
//! A [`Session`] is passed explicitly to every organizer-only operation; there
//! is no ambient "current user".

use serde::{Deserialize, Serialize};

/// An authenticated organizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user_id: String,
  pub email:   String,
}

/// Resolves credentials to a [`Session`].
///
/// Returns `None` for unknown users and wrong passwords alike.
pub trait IdentityProvider: Send + Sync {
  fn authenticate(&self, username: &str, password: &str) -> Option<Session>;
}
