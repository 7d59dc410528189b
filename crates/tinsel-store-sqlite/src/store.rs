//! [`SqliteStore`], the SQLite implementation of [`GroupStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use tinsel_core::{
  group::{AssignmentMap, Group},
  notify::{DeliveryOutcome, DeliveryRecord, DeliveryStatus},
  participant::{Participant, email_key},
  store::{GroupStore, WriteOutcome},
};

use crate::{
  Error, Result,
  encode::{
    RawDelivery, RawGroup, RawParticipant, decode_status, encode_answers, encode_assignments,
    encode_date, encode_dt, encode_mode, encode_questions, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run on the connection thread, inside `Connection::call`.

const GROUP_COLUMNS: &str = "group_id, name, welcome_message, organizer_id, organizer_email,
  budget, event_date, mode, status, hint_questions, assignments, created_at, drawn_at";

fn raw_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGroup> {
  Ok(RawGroup {
    group_id:        row.get(0)?,
    name:            row.get(1)?,
    welcome_message: row.get(2)?,
    organizer_id:    row.get(3)?,
    organizer_email: row.get(4)?,
    budget:          row.get(5)?,
    event_date:      row.get(6)?,
    mode:            row.get(7)?,
    status:          row.get(8)?,
    hint_questions:  row.get(9)?,
    assignments:     row.get(10)?,
    created_at:      row.get(11)?,
    drawn_at:        row.get(12)?,
    participants:    Vec::new(),
  })
}

fn read_participants(
  conn: &rusqlite::Connection,
  group_id: &str,
) -> rusqlite::Result<Vec<RawParticipant>> {
  let mut stmt = conn.prepare(
    "SELECT name, email, answers, is_organizer, joined_at
     FROM participants WHERE group_id = ?1 ORDER BY position",
  )?;
  stmt
    .query_map(rusqlite::params![group_id], |row| {
      Ok(RawParticipant {
        name:         row.get(0)?,
        email:        row.get(1)?,
        answers:      row.get(2)?,
        is_organizer: row.get(3)?,
        joined_at:    row.get(4)?,
      })
    })?
    .collect()
}

fn read_group(conn: &rusqlite::Connection, group_id: &str) -> rusqlite::Result<Option<RawGroup>> {
  let raw = conn
    .query_row(
      &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE group_id = ?1"),
      rusqlite::params![group_id],
      raw_group,
    )
    .optional()?;

  match raw {
    Some(mut raw) => {
      raw.participants = read_participants(conn, group_id)?;
      Ok(Some(raw))
    }
    None => Ok(None),
  }
}

fn read_status(conn: &rusqlite::Connection, group_id: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT status FROM groups WHERE group_id = ?1",
      rusqlite::params![group_id],
      |r| r.get(0),
    )
    .optional()
}

fn insert_participant(
  conn: &rusqlite::Connection,
  group_id: &str,
  position: i64,
  p: &EncodedParticipant,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO participants (
       group_id, position, name, email, email_key, answers, is_organizer, joined_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      group_id,
      position,
      p.name,
      p.email,
      p.email_key,
      p.answers,
      p.is_organizer,
      p.joined_at,
    ],
  )?;
  Ok(())
}

/// A participant flattened into column values, ready to move onto the
/// connection thread.
struct EncodedParticipant {
  name:         String,
  email:        String,
  email_key:    String,
  answers:      Option<String>,
  is_organizer: bool,
  joined_at:    String,
}

impl EncodedParticipant {
  fn new(p: &Participant) -> Result<Self> {
    Ok(Self {
      name:         p.name.clone(),
      email:        p.email.clone(),
      email_key:    email_key(&p.email),
      answers:      encode_answers(p.answers.as_ref())?,
      is_organizer: p.is_organizer,
      joined_at:    encode_dt(p.joined_at),
    })
  }
}

/// What a guarded transaction saw, before decoding.
enum Guarded {
  Applied(RawGroup),
  NotFound,
  WrongStatus(String),
  Duplicate(String),
  Stale,
}

impl Guarded {
  fn decode(self) -> Result<WriteOutcome<Group>> {
    Ok(match self {
      Guarded::Applied(raw) => WriteOutcome::Applied(raw.into_group()?),
      Guarded::NotFound => WriteOutcome::NotFound,
      Guarded::WrongStatus(s) => WriteOutcome::WrongStatus(decode_status(&s)?),
      Guarded::Duplicate(email) => WriteOutcome::DuplicateEmail(email),
      Guarded::Stale => WriteOutcome::Stale,
    })
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tinsel group store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── GroupStore impl ─────────────────────────────────────────────────────────

impl GroupStore for SqliteStore {
  type Error = Error;

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn create_group(&self, group: Group) -> Result<Group> {
    group.validate()?;

    let id_str        = encode_uuid(group.group_id);
    let name          = group.name.clone();
    let welcome       = group.welcome_message.clone();
    let organizer_id  = group.organizer_id.clone();
    let organizer_em  = group.organizer_email.clone();
    let budget        = group.budget;
    let event_date    = encode_date(group.event_date);
    let mode          = encode_mode(group.mode);
    let status        = encode_status(group.status);
    let questions     = encode_questions(&group.hint_questions)?;
    let assignments   = group.assignments.as_ref().map(encode_assignments).transpose()?;
    let created_at    = encode_dt(group.created_at);
    let drawn_at      = group.drawn_at.map(encode_dt);
    let participants  = group
      .participants
      .iter()
      .map(EncodedParticipant::new)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          &format!(
            "INSERT INTO groups ({GROUP_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
          ),
          rusqlite::params![
            id_str,
            name,
            welcome,
            organizer_id,
            organizer_em,
            budget,
            event_date,
            mode,
            status,
            questions,
            assignments,
            created_at,
            drawn_at,
          ],
        )?;
        for (position, p) in (0_i64..).zip(&participants) {
          insert_participant(&tx, &id_str, position, p)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(group_id = %group.group_id, "group row inserted");
    Ok(group)
  }

  async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_group(conn, &id_str)?)).await?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_by_organizer(&self, organizer_id: &str) -> Result<Vec<Group>> {
    let organizer_id = organizer_id.to_owned();

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let ids: Vec<String> = {
          let mut stmt = conn.prepare("SELECT group_id FROM groups WHERE organizer_id = ?1")?;
          stmt
            .query_map(rusqlite::params![organizer_id], |r| r.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };
        let mut raws = Vec::with_capacity(ids.len());
        for id in ids {
          if let Some(raw) = read_group(conn, &id)? {
            raws.push(raw);
          }
        }
        Ok(raws)
      })
      .await?;

    let mut groups = raws
      .into_iter()
      .map(RawGroup::into_group)
      .collect::<Result<Vec<_>>>()?;
    groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(groups)
  }

  async fn delete_group(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM groups WHERE group_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    debug!(group_id = %id, deleted = changed > 0, "delete group");
    Ok(changed > 0)
  }

  // ── Conditional transitions ───────────────────────────────────────────────

  async fn add_participant(&self, id: Uuid, participant: Participant) -> Result<WriteOutcome<Group>> {
    let id_str  = encode_uuid(id);
    let encoded = EncodedParticipant::new(&participant)?;

    let guarded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(status) = read_status(&tx, &id_str)? else {
          return Ok(Guarded::NotFound);
        };
        if status != "open" {
          return Ok(Guarded::WrongStatus(status));
        }

        let taken = tx
          .query_row(
            "SELECT 1 FROM participants WHERE group_id = ?1 AND email_key = ?2",
            rusqlite::params![id_str, encoded.email_key],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Guarded::Duplicate(encoded.email));
        }

        let position: i64 = tx.query_row(
          "SELECT COALESCE(MAX(position) + 1, 0) FROM participants WHERE group_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        insert_participant(&tx, &id_str, position, &encoded)?;

        let raw = read_group(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Guarded::NotFound, Guarded::Applied))
      })
      .await?;

    guarded.decode()
  }

  async fn commit_draw(
    &self,
    id:          Uuid,
    assignments: AssignmentMap,
    drawn_at:    DateTime<Utc>,
  ) -> Result<WriteOutcome<Group>> {
    let id_str       = encode_uuid(id);
    let givers: Vec<String> = assignments.keys().cloned().collect();
    let encoded      = encode_assignments(&assignments)?;
    let drawn_at_str = encode_dt(drawn_at);

    let guarded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(status) = read_status(&tx, &id_str)? else {
          return Ok(Guarded::NotFound);
        };
        if status != "open" {
          return Ok(Guarded::WrongStatus(status));
        }

        let mut current: Vec<String> = {
          let mut stmt = tx.prepare("SELECT email FROM participants WHERE group_id = ?1")?;
          stmt
            .query_map(rusqlite::params![id_str], |r| r.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };
        current.sort();
        if current != givers {
          return Ok(Guarded::Stale);
        }

        let changed = tx.execute(
          "UPDATE groups SET status = 'drawn', assignments = ?2, drawn_at = ?3
           WHERE group_id = ?1 AND status = 'open'",
          rusqlite::params![id_str, encoded, drawn_at_str],
        )?;
        if changed != 1 {
          return Ok(Guarded::WrongStatus(status));
        }

        let raw = read_group(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Guarded::NotFound, Guarded::Applied))
      })
      .await?;

    debug!(group_id = %id, applied = matches!(guarded, Guarded::Applied(_)), "commit draw");
    guarded.decode()
  }

  async fn close_group(&self, id: Uuid) -> Result<WriteOutcome<Group>> {
    let id_str = encode_uuid(id);

    let guarded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(status) = read_status(&tx, &id_str)? else {
          return Ok(Guarded::NotFound);
        };
        let changed = tx.execute(
          "UPDATE groups SET status = 'closed'
           WHERE group_id = ?1 AND status IN ('open', 'drawn')",
          rusqlite::params![id_str],
        )?;
        if changed != 1 {
          return Ok(Guarded::WrongStatus(status));
        }

        let raw = read_group(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map_or(Guarded::NotFound, Guarded::Applied))
      })
      .await?;

    guarded.decode()
  }

  // ── Delivery state ────────────────────────────────────────────────────────

  async fn record_delivery(
    &self,
    id:      Uuid,
    outcome: DeliveryOutcome,
    at:      DateTime<Utc>,
  ) -> Result<DeliveryRecord> {
    let id_str = encode_uuid(id);
    let email  = outcome.email.clone();
    let at_str = encode_dt(at);
    let (status, reason, retryable) = match &outcome.status {
      DeliveryStatus::Delivered => ("delivered", None, false),
      DeliveryStatus::Failed { reason, retryable } => ("failed", Some(reason.clone()), *retryable),
    };

    let attempts: u32 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO deliveries (group_id, email, status, reason, retryable, attempts, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
           ON CONFLICT (group_id, email) DO UPDATE SET
             status     = excluded.status,
             reason     = excluded.reason,
             retryable  = excluded.retryable,
             attempts   = deliveries.attempts + 1,
             updated_at = excluded.updated_at
           RETURNING attempts",
          rusqlite::params![id_str, email, status, reason, retryable, at_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(DeliveryRecord {
      email: outcome.email,
      status: outcome.status,
      attempts,
      updated_at: at,
    })
  }

  async fn list_deliveries(&self, id: Uuid) -> Result<Vec<DeliveryRecord>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawDelivery> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT email, status, reason, retryable, attempts, updated_at
           FROM deliveries WHERE group_id = ?1 ORDER BY email",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawDelivery {
              email:      row.get(0)?,
              status:     row.get(1)?,
              reason:     row.get(2)?,
              retryable:  row.get(3)?,
              attempts:   row.get(4)?,
              updated_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDelivery::into_record).collect()
  }
}
