//! SQL schema for the Hearth SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per user id. The record and discovery state are stored as JSON and
-- only ever grow: Q&A lists are appended to, never rewritten.
CREATE TABLE IF NOT EXISTS sessions (
    user_id     TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    record_json TEXT NOT NULL,
    state_json  TEXT NOT NULL
);

-- Transcript. Strictly append-only.
CREATE TABLE IF NOT EXISTS messages (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id    TEXT NOT NULL UNIQUE,
    user_id       TEXT NOT NULL REFERENCES sessions(user_id),
    speaker       TEXT NOT NULL,   -- 'user' | 'agent'
    text          TEXT NOT NULL,
    metadata_json TEXT,            -- ReplyMetadata on agent messages
    sent_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_user_idx ON messages(user_id, seq);

PRAGMA user_version = 1;
";
