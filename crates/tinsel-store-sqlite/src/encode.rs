//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs are
//! hyphenated lowercase strings. Structured fields (assignments, answers, hint
//! questions) are compact JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tinsel_core::{
  group::{AssignmentMap, Group, GroupMode, GroupStatus},
  notify::{DeliveryRecord, DeliveryStatus},
  participant::Participant,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_mode(m: GroupMode) -> &'static str {
  match m {
    GroupMode::Standard => "standard",
    GroupMode::Hint => "hint",
  }
}

pub fn decode_mode(s: &str) -> Result<GroupMode> {
  match s {
    "standard" => Ok(GroupMode::Standard),
    "hint" => Ok(GroupMode::Hint),
    other => Err(Error::UnknownValue { column: "mode", value: other.to_owned() }),
  }
}

pub fn encode_status(s: GroupStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<GroupStatus> {
  match s {
    "open" => Ok(GroupStatus::Open),
    "drawn" => Ok(GroupStatus::Drawn),
    "closed" => Ok(GroupStatus::Closed),
    other => Err(Error::UnknownValue { column: "status", value: other.to_owned() }),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_assignments(map: &AssignmentMap) -> Result<String> {
  Ok(serde_json::to_string(map)?)
}

pub fn encode_answers(answers: Option<&BTreeMap<usize, String>>) -> Result<Option<String>> {
  answers.map(serde_json::to_string).transpose().map_err(Error::from)
}

pub fn encode_questions(questions: &[String]) -> Result<String> {
  Ok(serde_json::to_string(questions)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `participants` row.
pub struct RawParticipant {
  pub name:         String,
  pub email:        String,
  pub answers:      Option<String>,
  pub is_organizer: bool,
  pub joined_at:    String,
}

impl RawParticipant {
  pub fn into_participant(self) -> Result<Participant> {
    Ok(Participant {
      name:         self.name,
      email:        self.email,
      answers:      self.answers.as_deref().map(serde_json::from_str).transpose()?,
      is_organizer: self.is_organizer,
      joined_at:    decode_dt(&self.joined_at)?,
    })
  }
}

/// Raw strings read from a `groups` row plus its participants.
pub struct RawGroup {
  pub group_id:        String,
  pub name:            String,
  pub welcome_message: Option<String>,
  pub organizer_id:    String,
  pub organizer_email: String,
  pub budget:          f64,
  pub event_date:      String,
  pub mode:            String,
  pub status:          String,
  pub hint_questions:  String,
  pub assignments:     Option<String>,
  pub created_at:      String,
  pub drawn_at:        Option<String>,
  pub participants:    Vec<RawParticipant>,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:        decode_uuid(&self.group_id)?,
      name:            self.name,
      welcome_message: self.welcome_message,
      organizer_id:    self.organizer_id,
      organizer_email: self.organizer_email,
      budget:          self.budget,
      event_date:      decode_date(&self.event_date)?,
      mode:            decode_mode(&self.mode)?,
      status:          decode_status(&self.status)?,
      hint_questions:  serde_json::from_str(&self.hint_questions)?,
      participants:    self
        .participants
        .into_iter()
        .map(RawParticipant::into_participant)
        .collect::<Result<_>>()?,
      assignments:     self.assignments.as_deref().map(serde_json::from_str).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
      drawn_at:        self.drawn_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read from a `deliveries` row.
pub struct RawDelivery {
  pub email:      String,
  pub status:     String,
  pub reason:     Option<String>,
  pub retryable:  bool,
  pub attempts:   u32,
  pub updated_at: String,
}

impl RawDelivery {
  pub fn into_record(self) -> Result<DeliveryRecord> {
    let status = match self.status.as_str() {
      "delivered" => DeliveryStatus::Delivered,
      "failed" => DeliveryStatus::Failed {
        reason:    self.reason.unwrap_or_default(),
        retryable: self.retryable,
      },
      other => {
        return Err(Error::UnknownValue { column: "delivery status", value: other.to_owned() });
      }
    };
    Ok(DeliveryRecord {
      email: self.email,
      status,
      attempts: self.attempts,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn dates_roundtrip() {
    let d = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();
    assert_eq!(encode_date(d), "2025-12-24");
    assert_eq!(decode_date("2025-12-24").unwrap(), d);

    let dt = Utc.with_ymd_and_hms(2025, 12, 1, 18, 30, 0).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn unknown_status_is_an_error() {
    assert!(matches!(
      decode_status("archived"),
      Err(Error::UnknownValue { column: "status", .. })
    ));
  }
}
