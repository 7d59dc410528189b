//! [`Exchange`]: the operations an organizer and participants perform on a
//! group, on top of any [`GroupStore`] and [`Notifier`].
//!
//! A draw is fetch → compute → conditional commit → notify. The commit only
//! succeeds while the group is still `open` with the participant list that was
//! drawn over; a lost race surfaces as [`Error::ConcurrentDrawConflict`] and
//! leaves the winner's assignments untouched. Notifications go out only after
//! the commit and are tracked per recipient.
//!
//! Every store and notifier call runs under a timeout. A timed-out store call
//! is reported to the caller as [`Error::Timeout`]; a timed-out send is a
//! retryable delivery failure.
//!
//! A timed-out store call is abandoned, not cancelled: the backend may still
//! apply it afterwards. For a draw commit the group is re-read once before
//! giving up. If the commit lands later still, the organizer sees a timeout
//! for a group that is `drawn`, and [`Exchange::notify_all`] sends the
//! notices that were skipped.

use std::{future::Future, time::Duration};

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  draw::{draw, verify_derangement},
  group::{AssignmentMap, Group, GroupStatus, Invitation, NewGroup, Pairing},
  notify::{DeliveryError, DeliveryOutcome, DeliveryRecord, DeliveryReport, DeliveryStatus, Notifier},
  participant::{JoinRequest, Participant, ensure_unique_emails},
  session::Session,
  store::{GroupStore, WriteOutcome},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
  /// Upper bound on any single store call.
  pub store_timeout:      Duration,
  /// Upper bound on a single notification send.
  pub notify_timeout:     Duration,
  /// How many notifications may be in flight at once.
  pub notify_concurrency: usize,
}

impl Default for ExchangeConfig {
  fn default() -> Self {
    Self {
      store_timeout:      Duration::from_secs(10),
      notify_timeout:     Duration::from_secs(15),
      notify_concurrency: 4,
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// A committed draw and the result of notifying everyone about it.
#[derive(Debug, Clone, Serialize)]
pub struct DrawOutcome {
  pub group:  Group,
  pub report: DeliveryReport,
}

// ─── Exchange ────────────────────────────────────────────────────────────────

pub struct Exchange<S, N> {
  store:    S,
  notifier: N,
  config:   ExchangeConfig,
}

impl<S, N> Exchange<S, N>
where
  S: GroupStore,
  N: Notifier,
{
  pub fn new(store: S, notifier: N, config: ExchangeConfig) -> Self {
    Self { store, notifier, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &ExchangeConfig { &self.config }

  // ── Store plumbing ────────────────────────────────────────────────────

  async fn store_call<T, E>(
    &self,
    op:  &'static str,
    fut: impl Future<Output = Result<T, E>>,
  ) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    tokio::time::timeout(self.config.store_timeout, fut)
      .await
      .map_err(|_| Error::Timeout(op))?
      .map_err(Error::store)
  }

  async fn load(&self, id: Uuid) -> Result<Group> {
    self
      .store_call("load group", self.store.get_group(id))
      .await?
      .ok_or(Error::GroupNotFound(id))
  }

  async fn load_owned(&self, session: &Session, id: Uuid) -> Result<Group> {
    let group = self.load(id).await?;
    if !group.is_organized_by(session) {
      return Err(Error::Forbidden);
    }
    Ok(group)
  }

  // ── Organizer: groups ─────────────────────────────────────────────────

  pub async fn create_group(&self, session: &Session, input: NewGroup) -> Result<Group> {
    let group = Group::new(session, input, Utc::now())?;
    let group = self.store_call("create group", self.store.create_group(group)).await?;
    info!(group_id = %group.group_id, organizer = %session.user_id, mode = ?group.mode, "group created");
    Ok(group)
  }

  pub async fn group(&self, session: &Session, id: Uuid) -> Result<Group> {
    self.load_owned(session, id).await
  }

  pub async fn list_groups(&self, session: &Session) -> Result<Vec<Group>> {
    self
      .store_call("list groups", self.store.list_by_organizer(&session.user_id))
      .await
  }

  pub async fn close(&self, session: &Session, id: Uuid) -> Result<Group> {
    self.load_owned(session, id).await?;
    match self.store_call("close group", self.store.close_group(id)).await? {
      WriteOutcome::Applied(group) => {
        info!(group_id = %id, "group closed");
        Ok(group)
      }
      WriteOutcome::NotFound => Err(Error::GroupNotFound(id)),
      WriteOutcome::WrongStatus(_) => Err(Error::AlreadyClosed(id)),
      WriteOutcome::DuplicateEmail(_) | WriteOutcome::Stale => Err(Error::Internal(format!(
        "store returned a participant conflict while closing group {id}"
      ))),
    }
  }

  pub async fn delete(&self, session: &Session, id: Uuid) -> Result<()> {
    self.load_owned(session, id).await?;
    if !self.store_call("delete group", self.store.delete_group(id)).await? {
      return Err(Error::GroupNotFound(id));
    }
    info!(group_id = %id, "group deleted");
    Ok(())
  }

  // ── Participants ──────────────────────────────────────────────────────

  /// Public view behind the join link.
  pub async fn invitation(&self, id: Uuid) -> Result<Invitation> {
    Ok(self.load(id).await?.invitation())
  }

  /// Add a participant through the join link.
  pub async fn join(&self, id: Uuid, request: JoinRequest) -> Result<Participant> {
    let group = self.load(id).await?;
    if group.status != GroupStatus::Open {
      return Err(Error::GroupNotOpen { id, status: group.status });
    }

    let participant =
      request.into_participant(group.mode, group.hint_questions.len(), Utc::now())?;
    if group.has_participant(&participant.email) {
      return Err(Error::DuplicateParticipant(participant.email));
    }

    match self
      .store_call("join group", self.store.add_participant(id, participant.clone()))
      .await?
    {
      WriteOutcome::Applied(_) => {
        info!(group_id = %id, "participant joined");
        Ok(participant)
      }
      WriteOutcome::NotFound => Err(Error::GroupNotFound(id)),
      WriteOutcome::WrongStatus(status) => Err(Error::GroupNotOpen { id, status }),
      WriteOutcome::DuplicateEmail(email) => Err(Error::DuplicateParticipant(email)),
      WriteOutcome::Stale => Err(Error::DuplicateParticipant(participant.email)),
    }
  }

  // ── Draw ──────────────────────────────────────────────────────────────

  /// Run the draw for an open group, commit it, and notify everyone.
  ///
  /// A failed draw leaves the group `open`. Notification failures do not
  /// undo the commit; they are reported in [`DrawOutcome::report`].
  ///
  /// A group that is already `drawn` is a lost race whether the other draw
  /// committed before or after this one read the group.
  pub async fn draw(&self, session: &Session, id: Uuid) -> Result<DrawOutcome> {
    let group = self.load_owned(session, id).await?;
    match group.status {
      GroupStatus::Open => {}
      GroupStatus::Drawn => return Err(Error::ConcurrentDrawConflict(id)),
      status => return Err(Error::GroupNotOpen { id, status }),
    }
    ensure_unique_emails(&group.participants)?;

    let assignments = draw(&group.participants)?;
    verify_derangement(&group.participants, &assignments)?;

    let committed = match self
      .store_call("commit draw", self.store.commit_draw(id, assignments.clone(), Utc::now()))
      .await
    {
      Ok(WriteOutcome::Applied(group)) => group,
      Ok(WriteOutcome::NotFound) => return Err(Error::GroupNotFound(id)),
      Ok(rejected) => {
        warn!(group_id = %id, outcome = ?rejected, "draw commit rejected");
        return Err(Error::ConcurrentDrawConflict(id));
      }
      Err(Error::Timeout(op)) => match self.landed_draw(id, &assignments).await {
        Some(group) => {
          warn!(group_id = %id, "draw commit timed out but was applied");
          group
        }
        None => return Err(Error::Timeout(op)),
      },
      Err(e) => return Err(e),
    };
    info!(group_id = %id, participants = committed.participants.len(), "draw committed");

    let report = self.notify_group(&committed).await;
    info!(
      group_id = %id,
      delivered = report.succeeded(),
      failed = report.failed(),
      "draw notifications sent"
    );
    Ok(DrawOutcome { group: committed, report })
  }

  /// The stored group, if it holds exactly the draw that was being committed.
  async fn landed_draw(&self, id: Uuid, assignments: &AssignmentMap) -> Option<Group> {
    let group = self.load(id).await.ok()?;
    (group.status == GroupStatus::Drawn && group.assignments.as_ref() == Some(assignments))
      .then_some(group)
  }

  /// Results for everyone, once the event date has arrived.
  pub async fn results(&self, id: Uuid, today: NaiveDate) -> Result<Vec<Pairing>> {
    let group = self.load(id).await?;
    if group.event_date > today {
      return Err(Error::ResultsNotYetAvailable(group.event_date));
    }
    group.pairings()
  }

  // ── Notifications ─────────────────────────────────────────────────────

  /// Send the draw result to every participant again.
  pub async fn notify_all(&self, session: &Session, id: Uuid) -> Result<DeliveryReport> {
    let group = self.load_owned(session, id).await?;
    if group.assignments.is_none() {
      return Err(Error::NotDrawn(id));
    }
    Ok(self.notify_group(&group).await)
  }

  /// Send the draw result to a single participant.
  pub async fn resend(&self, session: &Session, id: Uuid, email: &str) -> Result<DeliveryOutcome> {
    let group = self.load_owned(session, id).await?;
    if group.assignments.is_none() {
      return Err(Error::NotDrawn(id));
    }
    let participant = group
      .find_participant(email)
      .ok_or_else(|| Error::ParticipantNotFound(email.to_owned()))?;
    Ok(self.deliver(&group, participant).await)
  }

  pub async fn deliveries(&self, session: &Session, id: Uuid) -> Result<Vec<DeliveryRecord>> {
    self.load_owned(session, id).await?;
    self
      .store_call("list deliveries", self.store.list_deliveries(id))
      .await
  }

  async fn notify_group(&self, group: &Group) -> DeliveryReport {
    let mut outcomes = Vec::with_capacity(group.participants.len());
    for batch in group.participants.chunks(self.config.notify_concurrency.max(1)) {
      outcomes.extend(join_all(batch.iter().map(|p| self.deliver(group, p))).await);
    }
    DeliveryReport { outcomes }
  }

  async fn deliver(&self, group: &Group, participant: &Participant) -> DeliveryOutcome {
    let status = match group.notice_for(&participant.email) {
      Err(e) => DeliveryStatus::Failed { reason: e.to_string(), retryable: false },
      Ok(notice) => {
        match tokio::time::timeout(self.config.notify_timeout, self.notifier.send(notice)).await {
          Ok(Ok(())) => DeliveryStatus::Delivered,
          Ok(Err(e)) => DeliveryStatus::Failed {
            reason:    e.to_string(),
            retryable: e.is_retryable(),
          },
          Err(_) => DeliveryStatus::Failed {
            reason:    "notification timed out".into(),
            retryable: true,
          },
        }
      }
    };

    if let DeliveryStatus::Failed { reason, retryable } = &status {
      warn!(group_id = %group.group_id, email = %participant.email, %reason, retryable, "notification failed");
    }

    let outcome = DeliveryOutcome { email: participant.email.clone(), status };
    if let Err(e) = self
      .store_call(
        "record delivery",
        self.store.record_delivery(group.group_id, outcome.clone(), Utc::now()),
      )
      .await
    {
      warn!(group_id = %group.group_id, email = %participant.email, error = %e, "could not record delivery state");
    }
    outcome
  }
}
