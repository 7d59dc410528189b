//! Groups, the unit a draw runs over.
//!
//! A group is created `open`, collects participants through its join link,
//! moves to `drawn` exactly once when the organizer runs the draw, and may be
//! `closed` afterwards. The assignment map is written by the draw and never
//! recomputed.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  draw::verify_derangement,
  notify::{DrawNotice, Hint, MatchReveal},
  participant::{Match, Participant, email_key, ensure_unique_emails, normalize_email},
  session::Session,
};

/// Giver email → the participant they buy for.
pub type AssignmentMap = BTreeMap<String, Match>;

/// Prompts stamped onto every hint-mode group.
pub const HINT_QUESTIONS: [&str; 5] = [
  "What is your favourite colour?",
  "What is your favourite hobby?",
  "What is your favourite kind of food?",
  "What would your ideal gift be?",
  "What is your favourite holiday tradition?",
];

// ─── Mode & status ───────────────────────────────────────────────────────────

/// How participants learn their match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
  /// The match's name is revealed directly.
  #[default]
  Standard,
  /// Only the match's answers to the hint questions are revealed.
  #[serde(alias = "chaos")]
  Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
  Open,
  Drawn,
  Closed,
}

impl GroupStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "open",
      Self::Drawn => "drawn",
      Self::Closed => "closed",
    }
  }
}

impl fmt::Display for GroupStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// The organizer's own entry when they take part in their own exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizerEnrollment {
  pub name:  String,
  pub email: String,
}

/// Everything the organizer supplies when creating a group.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
  pub name:            String,
  #[serde(default)]
  pub welcome_message: Option<String>,
  #[serde(default)]
  pub mode:            GroupMode,
  pub budget:          f64,
  pub event_date:      NaiveDate,
  #[serde(default)]
  pub enroll:          Option<OrganizerEnrollment>,
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:        Uuid,
  pub name:            String,
  pub welcome_message: Option<String>,
  pub organizer_id:    String,
  pub organizer_email: String,
  pub budget:          f64,
  pub event_date:      NaiveDate,
  pub mode:            GroupMode,
  pub status:          GroupStatus,
  /// Empty unless `mode` is [`GroupMode::Hint`].
  pub hint_questions:  Vec<String>,
  /// In join order.
  pub participants:    Vec<Participant>,
  pub assignments:     Option<AssignmentMap>,
  pub created_at:      DateTime<Utc>,
  pub drawn_at:        Option<DateTime<Utc>>,
}

impl Group {
  /// Build a fresh `open` group owned by `session`.
  pub fn new(session: &Session, input: NewGroup, now: DateTime<Utc>) -> Result<Self> {
    if input.event_date < now.date_naive() {
      return Err(Error::Invalid("event date is in the past".into()));
    }

    let hint_questions = match input.mode {
      GroupMode::Standard => Vec::new(),
      GroupMode::Hint => HINT_QUESTIONS.iter().map(|q| (*q).to_owned()).collect(),
    };

    let mut participants = Vec::new();
    if let Some(me) = input.enroll {
      let name = me.name.trim();
      if name.is_empty() {
        return Err(Error::Invalid("organizer name is required to take part".into()));
      }
      participants.push(Participant {
        name:         name.to_owned(),
        email:        normalize_email(&me.email)?,
        answers:      (input.mode == GroupMode::Hint).then(BTreeMap::new),
        is_organizer: true,
        joined_at:    now,
      });
    }

    let group = Self {
      group_id: Uuid::new_v4(),
      name: input.name.trim().to_owned(),
      welcome_message: input
        .welcome_message
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty()),
      organizer_id: session.user_id.clone(),
      organizer_email: session.email.clone(),
      budget: input.budget,
      event_date: input.event_date,
      mode: input.mode,
      status: GroupStatus::Open,
      hint_questions,
      participants,
      assignments: None,
      created_at: now,
      drawn_at: None,
    };
    group.validate()?;
    Ok(group)
  }

  /// Structural checks applied whenever a group crosses the store boundary.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Invalid("group name is required".into()));
    }
    if !self.budget.is_finite() || self.budget <= 0.0 {
      return Err(Error::Invalid(format!("budget must be positive, got {}", self.budget)));
    }
    match (self.mode, self.hint_questions.is_empty()) {
      (GroupMode::Hint, true) => {
        return Err(Error::Invalid("hint mode requires hint questions".into()));
      }
      (GroupMode::Standard, false) => {
        return Err(Error::Invalid("standard mode takes no hint questions".into()));
      }
      _ => {}
    }
    ensure_unique_emails(&self.participants)?;

    match (self.status, &self.assignments) {
      (GroupStatus::Open, Some(_)) => {
        return Err(Error::InvalidAssignment("open group already has assignments".into()));
      }
      (GroupStatus::Drawn, None) => {
        return Err(Error::InvalidAssignment("drawn group has no assignments".into()));
      }
      (_, Some(map)) => verify_derangement(&self.participants, map)?,
      (_, None) => {}
    }
    Ok(())
  }

  pub fn is_organized_by(&self, session: &Session) -> bool {
    self.organizer_id == session.user_id
  }

  /// Look a participant up by email, ignoring case.
  pub fn find_participant(&self, email: &str) -> Option<&Participant> {
    let key = email_key(email);
    self.participants.iter().find(|p| email_key(&p.email) == key)
  }

  pub fn has_participant(&self, email: &str) -> bool { self.find_participant(email).is_some() }

  pub fn summary(&self) -> GroupSummary {
    GroupSummary {
      group_id:        self.group_id,
      name:            self.name.clone(),
      welcome_message: self.welcome_message.clone(),
      event_date:      self.event_date,
      budget:          self.budget,
      mode:            self.mode,
    }
  }

  pub fn invitation(&self) -> Invitation {
    Invitation {
      group:             self.summary(),
      hint_questions:    self.hint_questions.clone(),
      status:            self.status,
      participant_count: self.participants.len(),
    }
  }

  /// Build the notification for the participant with `giver_email`.
  ///
  /// In hint mode the recipient's answers are revealed instead of their name.
  pub fn notice_for(&self, giver_email: &str) -> Result<DrawNotice> {
    let giver = self
      .find_participant(giver_email)
      .ok_or_else(|| Error::ParticipantNotFound(giver_email.to_owned()))?;
    let assignments = self.assignments.as_ref().ok_or(Error::NotDrawn(self.group_id))?;
    let target = assignments.get(&giver.email).ok_or_else(|| {
      Error::InvalidAssignment(format!("{} has no recipient", giver.email))
    })?;

    let reveal = match self.mode {
      GroupMode::Standard => MatchReveal::Direct(target.clone()),
      GroupMode::Hint => {
        let answers = self
          .find_participant(&target.email)
          .and_then(|p| p.answers.as_ref());
        let hints = self
          .hint_questions
          .iter()
          .enumerate()
          .filter_map(|(idx, question)| {
            answers.and_then(|a| a.get(&idx)).map(|answer| Hint {
              question: question.clone(),
              answer:   answer.clone(),
            })
          })
          .collect();
        MatchReveal::Hints(hints)
      }
    };

    Ok(DrawNotice { group: self.summary(), recipient: giver.as_match(), reveal })
  }

  /// The complete giver → recipient list, in join order.
  pub fn pairings(&self) -> Result<Vec<Pairing>> {
    let assignments = self.assignments.as_ref().ok_or(Error::NotDrawn(self.group_id))?;
    self
      .participants
      .iter()
      .map(|p| {
        let recipient = assignments.get(&p.email).cloned().ok_or_else(|| {
          Error::InvalidAssignment(format!("{} has no recipient", p.email))
        })?;
        Ok(Pairing { giver: p.as_match(), recipient })
      })
      .collect()
  }
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// The group details every participant is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
  pub group_id:        Uuid,
  pub name:            String,
  pub welcome_message: Option<String>,
  pub event_date:      NaiveDate,
  pub budget:          f64,
  pub mode:            GroupMode,
}

/// What the join link shows before someone signs up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
  #[serde(flatten)]
  pub group:             GroupSummary,
  pub hint_questions:    Vec<String>,
  pub status:            GroupStatus,
  pub participant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
  pub giver:     Match,
  pub recipient: Match,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::draw::draw;

  fn organizer() -> Session {
    Session { user_id: "org-1".into(), email: "org@example.com".into() }
  }

  fn new_group(mode: GroupMode) -> NewGroup {
    NewGroup {
      name: "  Office party ".into(),
      welcome_message: Some("   ".into()),
      mode,
      budget: 25.0,
      event_date: Utc::now().date_naive() + Duration::days(30),
      enroll: None,
    }
  }

  fn participant(name: &str, email: &str, answers: Option<BTreeMap<usize, String>>) -> Participant {
    Participant {
      name: name.into(),
      email: email.into(),
      answers,
      is_organizer: false,
      joined_at: Utc::now(),
    }
  }

  #[test]
  fn new_group_is_open_and_trimmed() {
    let g = Group::new(&organizer(), new_group(GroupMode::Standard), Utc::now()).unwrap();
    assert_eq!(g.status, GroupStatus::Open);
    assert_eq!(g.name, "Office party");
    assert!(g.welcome_message.is_none());
    assert!(g.hint_questions.is_empty());
    assert!(g.participants.is_empty());
    assert!(g.is_organized_by(&organizer()));
  }

  #[test]
  fn hint_group_gets_questions() {
    let g = Group::new(&organizer(), new_group(GroupMode::Hint), Utc::now()).unwrap();
    assert_eq!(g.hint_questions.len(), HINT_QUESTIONS.len());
  }

  #[test]
  fn organizer_can_enroll() {
    let mut input = new_group(GroupMode::Standard);
    input.enroll = Some(OrganizerEnrollment { name: "Olga".into(), email: "olga@example.com".into() });
    let g = Group::new(&organizer(), input, Utc::now()).unwrap();
    assert_eq!(g.participants.len(), 1);
    assert!(g.participants[0].is_organizer);
  }

  #[test]
  fn past_event_date_is_rejected() {
    let mut input = new_group(GroupMode::Standard);
    input.event_date = Utc::now().date_naive() - Duration::days(1);
    assert!(matches!(
      Group::new(&organizer(), input, Utc::now()),
      Err(Error::Invalid(_))
    ));
  }

  #[test]
  fn non_positive_budget_is_rejected() {
    for budget in [0.0, -5.0, f64::NAN] {
      let mut input = new_group(GroupMode::Standard);
      input.budget = budget;
      assert!(Group::new(&organizer(), input, Utc::now()).is_err());
    }
  }

  #[test]
  fn chaos_is_accepted_as_hint() {
    let mode: GroupMode = serde_json::from_str("\"chaos\"").unwrap();
    assert_eq!(mode, GroupMode::Hint);
    assert_eq!(serde_json::to_string(&GroupMode::Hint).unwrap(), "\"hint\"");
  }

  #[test]
  fn validate_rejects_drawn_without_assignments() {
    let mut g = Group::new(&organizer(), new_group(GroupMode::Standard), Utc::now()).unwrap();
    g.status = GroupStatus::Drawn;
    assert!(matches!(g.validate(), Err(Error::InvalidAssignment(_))));
  }

  #[test]
  fn find_participant_ignores_case() {
    let mut g = Group::new(&organizer(), new_group(GroupMode::Standard), Utc::now()).unwrap();
    g.participants.push(participant("Ann", "Ann@Example.com", None));
    assert!(g.has_participant("ann@example.COM"));
  }

  #[test]
  fn standard_notice_names_the_match() {
    let mut g = Group::new(&organizer(), new_group(GroupMode::Standard), Utc::now()).unwrap();
    g.participants.push(participant("Ann", "ann@example.com", None));
    g.participants.push(participant("Ben", "ben@example.com", None));
    g.assignments = Some(draw(&g.participants).unwrap());
    g.status = GroupStatus::Drawn;
    g.validate().unwrap();

    let notice = g.notice_for("ann@example.com").unwrap();
    assert_eq!(notice.recipient.email, "ann@example.com");
    assert_eq!(notice.reveal, MatchReveal::Direct(Match::new("Ben", "ben@example.com")));
  }

  #[test]
  fn hint_notice_reveals_answers_only() {
    let mut g = Group::new(&organizer(), new_group(GroupMode::Hint), Utc::now()).unwrap();
    let answers = BTreeMap::from([(1, "knitting".to_string()), (3, "socks".to_string())]);
    g.participants.push(participant("Ann", "ann@example.com", Some(BTreeMap::new())));
    g.participants.push(participant("Ben", "ben@example.com", Some(answers)));
    g.assignments = Some(draw(&g.participants).unwrap());
    g.status = GroupStatus::Drawn;

    let MatchReveal::Hints(hints) = g.notice_for("ann@example.com").unwrap().reveal else {
      panic!("expected hints");
    };
    assert_eq!(hints.len(), 2);
    assert_eq!(hints[0].question, HINT_QUESTIONS[1]);
    assert_eq!(hints[0].answer, "knitting");
    assert_eq!(hints[1].answer, "socks");
  }

  #[test]
  fn pairings_follow_join_order() {
    let mut g = Group::new(&organizer(), new_group(GroupMode::Standard), Utc::now()).unwrap();
    for (n, e) in [("Ann", "ann@example.com"), ("Ben", "ben@example.com"), ("Cy", "cy@example.com")] {
      g.participants.push(participant(n, e, None));
    }
    assert!(matches!(g.pairings(), Err(Error::NotDrawn(_))));

    g.assignments = Some(draw(&g.participants).unwrap());
    let pairs = g.pairings().unwrap();
    let givers: Vec<_> = pairs.iter().map(|p| p.giver.name.as_str()).collect();
    assert_eq!(givers, ["Ann", "Ben", "Cy"]);
    assert!(pairs.iter().all(|p| p.giver != p.recipient));
  }
}
