//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. The record, discovery state
//! and reply metadata are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use hearth_core::session::{ChatMessage, DiscoveryState, Speaker, UserSession};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Speaker ──────────────────────────────────────────────────────────────────

pub fn encode_speaker(s: Speaker) -> &'static str {
  match s {
    Speaker::User => "user",
    Speaker::Agent => "agent",
  }
}

pub fn decode_speaker(s: &str) -> Result<Speaker> {
  match s {
    "user" => Ok(Speaker::User),
    "agent" => Ok(Speaker::Agent),
    other => Err(Error::UnknownSpeaker(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub user_id:     String,
  pub created_at:  String,
  pub updated_at:  String,
  pub record_json: String,
  pub state_json:  String,
}

pub const SESSION_COLUMNS: &str =
  "user_id, created_at, updated_at, record_json, state_json";

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      created_at:  row.get(1)?,
      updated_at:  row.get(2)?,
      record_json: row.get(3)?,
      state_json:  row.get(4)?,
    })
  }

  pub fn from_session(session: &UserSession) -> Result<Self> {
    Ok(Self {
      user_id:     session.user_id.clone(),
      created_at:  encode_dt(session.created_at),
      updated_at:  encode_dt(session.updated_at),
      record_json: serde_json::to_string(&session.record)?,
      state_json:  serde_json::to_string(&session.state)?,
    })
  }

  /// Decode a row. An unreadable discovery state restarts the script at the
  /// first stage; an unreadable record is an error, since it holds answers.
  pub fn into_session(self) -> Result<UserSession> {
    let state = serde_json::from_str(&self.state_json).unwrap_or_else(|e| {
      tracing::warn!(user_id = %self.user_id, "resetting unreadable discovery state: {e}");
      DiscoveryState::default()
    });
    Ok(UserSession {
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      record:     serde_json::from_str(&self.record_json)?,
      user_id:    self.user_id,
      state,
    })
  }
}

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:    String,
  pub speaker:       String,
  pub text:          String,
  pub metadata_json: Option<String>,
  pub sent_at:       String,
}

pub const MESSAGE_COLUMNS: &str =
  "message_id, speaker, text, metadata_json, sent_at";

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:    row.get(0)?,
      speaker:       row.get(1)?,
      text:          row.get(2)?,
      metadata_json: row.get(3)?,
      sent_at:       row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      message_id: decode_uuid(&self.message_id)?,
      speaker:    decode_speaker(&self.speaker)?,
      text:       self.text,
      metadata:   self
        .metadata_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
      sent_at:    decode_dt(&self.sent_at)?,
    })
  }
}
