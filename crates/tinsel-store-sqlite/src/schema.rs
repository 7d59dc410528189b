//! SQL schema for the Tinsel SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS groups (
    group_id         TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    welcome_message  TEXT,
    organizer_id     TEXT NOT NULL,
    organizer_email  TEXT NOT NULL,
    budget           REAL NOT NULL CHECK (budget > 0),
    event_date       TEXT NOT NULL,   -- YYYY-MM-DD
    mode             TEXT NOT NULL,   -- 'standard' | 'hint'
    status           TEXT NOT NULL DEFAULT 'open',  -- 'open' | 'drawn' | 'closed'
    hint_questions   TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    assignments      TEXT,            -- JSON object, giver email -> {name, email}
    created_at       TEXT NOT NULL,   -- RFC 3339 UTC
    drawn_at         TEXT,
    CHECK (status = 'closed' OR (status = 'open') = (assignments IS NULL))
);

-- Participants are append-only while the group is open.
CREATE TABLE IF NOT EXISTS participants (
    group_id      TEXT NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    position      INTEGER NOT NULL,  -- join order
    name          TEXT NOT NULL,
    email         TEXT NOT NULL,
    email_key     TEXT NOT NULL,     -- lower-cased email
    answers       TEXT,              -- JSON object or NULL outside hint mode
    is_organizer  INTEGER NOT NULL DEFAULT 0,
    joined_at     TEXT NOT NULL,
    PRIMARY KEY (group_id, position),
    UNIQUE (group_id, email_key)
);

-- Latest notification attempt per recipient.
CREATE TABLE IF NOT EXISTS deliveries (
    group_id    TEXT NOT NULL REFERENCES groups(group_id) ON DELETE CASCADE,
    email       TEXT NOT NULL,
    status      TEXT NOT NULL,     -- 'delivered' | 'failed'
    reason      TEXT,
    retryable   INTEGER NOT NULL DEFAULT 0,
    attempts    INTEGER NOT NULL DEFAULT 1,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (group_id, email)
);

CREATE INDEX IF NOT EXISTS groups_organizer_idx ON groups(organizer_id, created_at);

PRAGMA user_version = 1;
";
