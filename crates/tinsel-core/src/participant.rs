//! Participants and join requests.
//!
//! A participant is identified by email within a group. Emails are stored as
//! entered (trimmed) and compared case-insensitively via [`email_key`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, group::GroupMode};

// ─── Entrant ─────────────────────────────────────────────────────────────────

/// Anything that can be fed to the draw engine.
pub trait Entrant {
  fn name(&self) -> &str;
  fn email(&self) -> &str;
}

// ─── Match ───────────────────────────────────────────────────────────────────

/// The `{name, email}` pair stored as an assignment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
  pub name:  String,
  pub email: String,
}

impl Match {
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self { name: name.into(), email: email.into() }
  }
}

impl Entrant for Match {
  fn name(&self) -> &str { &self.name }

  fn email(&self) -> &str { &self.email }
}

// ─── Participant ─────────────────────────────────────────────────────────────

/// A member of a group. Immutable once joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub name:         String,
  pub email:        String,
  /// Answers to the group's hint questions, keyed by question index.
  /// Present only in hint-mode groups.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answers:      Option<BTreeMap<usize, String>>,
  /// Set when the organizer enrolled themselves while creating the group.
  #[serde(default)]
  pub is_organizer: bool,
  pub joined_at:    DateTime<Utc>,
}

impl Participant {
  pub fn as_match(&self) -> Match { Match::new(&self.name, &self.email) }
}

impl Entrant for Participant {
  fn name(&self) -> &str { &self.name }

  fn email(&self) -> &str { &self.email }
}

// ─── Email helpers ───────────────────────────────────────────────────────────

/// Case-insensitive comparison key for an email address.
pub fn email_key(email: &str) -> String { email.trim().to_lowercase() }

/// Trim and sanity-check an email address.
///
/// Deliberately loose: one `@`, non-empty local part, a dotted domain, and no
/// whitespace.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim();
  let invalid = || Error::Invalid(format!("not an email address: {raw:?}"));

  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  if local.is_empty()
    || domain.contains('@')
    || !domain.contains('.')
    || domain.starts_with('.')
    || domain.ends_with('.')
  {
    return Err(invalid());
  }
  Ok(email.to_owned())
}

/// Fail with [`Error::DuplicateParticipant`] on the first email that appears
/// twice (case-insensitively).
pub fn ensure_unique_emails<P: Entrant>(participants: &[P]) -> Result<()> {
  let mut seen = HashSet::with_capacity(participants.len());
  for p in participants {
    if !seen.insert(email_key(p.email())) {
      return Err(Error::DuplicateParticipant(p.email().to_owned()));
    }
  }
  Ok(())
}

// ─── Join request ────────────────────────────────────────────────────────────

/// Body submitted through the shared join link.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
  pub name:    String,
  pub email:   String,
  #[serde(default)]
  pub answers: BTreeMap<usize, String>,
}

impl JoinRequest {
  /// Validate the request and turn it into a [`Participant`].
  ///
  /// Answers are kept only for hint-mode groups, and only for indices below
  /// `question_count`. Blank answers are dropped.
  pub fn into_participant(
    self,
    mode:           GroupMode,
    question_count: usize,
    joined_at:      DateTime<Utc>,
  ) -> Result<Participant> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(Error::Invalid("name is required".into()));
    }
    let email = normalize_email(&self.email)?;

    let answers = match mode {
      GroupMode::Standard => None,
      GroupMode::Hint => Some(
        self
          .answers
          .into_iter()
          .filter(|(idx, answer)| *idx < question_count && !answer.trim().is_empty())
          .map(|(idx, answer)| (idx, answer.trim().to_owned()))
          .collect(),
      ),
    };

    Ok(Participant {
      name: name.to_owned(),
      email,
      answers,
      is_organizer: false,
      joined_at,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(name: &str, email: &str) -> JoinRequest {
    JoinRequest { name: name.into(), email: email.into(), answers: BTreeMap::new() }
  }

  #[test]
  fn email_key_ignores_case_and_padding() {
    assert_eq!(email_key("  Alice@Example.COM "), "alice@example.com");
  }

  #[test]
  fn normalize_email_accepts_plain_addresses() {
    assert_eq!(normalize_email(" bob@example.org ").unwrap(), "bob@example.org");
  }

  #[test]
  fn normalize_email_rejects_garbage() {
    for bad in ["", "bob", "@example.org", "bob@", "bob@example", "b ob@example.org", "a@b@c.d"] {
      assert!(normalize_email(bad).is_err(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn duplicate_emails_are_case_insensitive() {
    let people = vec![Match::new("A", "a@x.io"), Match::new("B", "A@X.io")];
    assert!(matches!(
      ensure_unique_emails(&people),
      Err(Error::DuplicateParticipant(e)) if e == "A@X.io"
    ));
  }

  #[test]
  fn standard_mode_drops_answers() {
    let mut req = request("Ann", "ann@example.com");
    req.answers.insert(0, "blue".into());
    let p = req.into_participant(GroupMode::Standard, 5, Utc::now()).unwrap();
    assert!(p.answers.is_none());
    assert!(!p.is_organizer);
  }

  #[test]
  fn hint_mode_keeps_known_nonblank_answers() {
    let mut req = request("Ann", "ann@example.com");
    req.answers.insert(0, " blue ".into());
    req.answers.insert(1, "   ".into());
    req.answers.insert(9, "out of range".into());
    let p = req.into_participant(GroupMode::Hint, 5, Utc::now()).unwrap();
    let answers = p.answers.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[&0], "blue");
  }

  #[test]
  fn blank_name_is_rejected() {
    let err = request("  ", "ann@example.com")
      .into_participant(GroupMode::Standard, 0, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
  }
}
