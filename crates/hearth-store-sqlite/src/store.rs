//! [`SqliteStore`] — the SQLite implementation of [`SessionStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, Transaction};

use hearth_core::{
  record::{ComprehensiveRecord, QaEntry, RecordUpdate},
  session::{BookedVisit, ChatMessage, DiscoveryState, ReplyMetadata, UserSession},
  stage::Stage,
  store::SessionStore,
};

use crate::{
  Error, Result,
  encode::{
    MESSAGE_COLUMNS, RawMessage, RawSession, SESSION_COLUMNS, encode_dt,
    encode_speaker, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hearth session store backed by a single SQLite file (or memory).
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

  /// Open an in-memory store. State lives as long as the process.
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

  /// Load (creating if needed) the session for `user_id`, apply `f`, and
  /// write it back, all inside one transaction. Nothing is written when `f`
  /// fails.
  async fn mutate<T, F>(&self, user_id: &str, f: F) -> Result<T>
  where
    F: FnOnce(&mut UserSession) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let user_id = user_id.to_owned();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = mutate_in_tx(&tx, &user_id, f);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;
    outcome
  }
}

fn load_session(tx: &Transaction<'_>, user_id: &str) -> Result<Option<UserSession>> {
  let raw = tx
    .query_row(
      &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1"),
      rusqlite::params![user_id],
      RawSession::from_row,
    )
    .optional()?;
  raw.map(RawSession::into_session).transpose()
}

fn load_or_insert(tx: &Transaction<'_>, user_id: &str) -> Result<UserSession> {
  if let Some(session) = load_session(tx, user_id)? {
    return Ok(session);
  }
  let session = UserSession::new(user_id);
  let raw = RawSession::from_session(&session)?;
  tx.execute(
    &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
    rusqlite::params![
      raw.user_id,
      raw.created_at,
      raw.updated_at,
      raw.record_json,
      raw.state_json,
    ],
  )?;
  tracing::debug!(user_id, "created session");
  Ok(session)
}

fn mutate_in_tx<T, F>(tx: &Transaction<'_>, user_id: &str, f: F) -> Result<T>
where
  F: FnOnce(&mut UserSession) -> Result<T>,
{
  let mut session = load_or_insert(tx, user_id)?;
  let out = f(&mut session)?;
  session.updated_at = Utc::now();
  let raw = RawSession::from_session(&session)?;
  tx.execute(
    "UPDATE sessions
        SET updated_at = ?2, record_json = ?3, state_json = ?4
      WHERE user_id = ?1",
    rusqlite::params![raw.user_id, raw.updated_at, raw.record_json, raw.state_json],
  )?;
  Ok(out)
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn get_or_create(&self, user_id: &str) -> Result<UserSession> {
    let user_id = user_id.to_owned();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = load_or_insert(&tx, &user_id);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;
    outcome
  }

  async fn get(&self, user_id: &str) -> Result<Option<UserSession>> {
    let user_id = user_id.to_owned();
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1"),
            rusqlite::params![user_id],
            RawSession::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  // ── Record — append-only writes ───────────────────────────────────────────

  async fn update_record(
    &self,
    user_id: &str,
    update: RecordUpdate,
  ) -> Result<ComprehensiveRecord> {
    self
      .mutate(user_id, move |session| {
        session.record.merge(update)?;
        Ok(session.record.clone())
      })
      .await
  }

  async fn add_qa_entry(
    &self,
    user_id: &str,
    stage: Stage,
    question: &str,
    answer: &str,
  ) -> Result<bool> {
    let entry = QaEntry::new(stage, question, answer);
    self
      .mutate(user_id, move |session| Ok(session.record.push_entry(entry)?))
      .await
  }

  async fn answered_questions(
    &self,
    user_id: &str,
    stage: Stage,
  ) -> Result<Vec<String>> {
    let session = self.get(user_id).await?;
    Ok(
      session
        .map(|s| {
          s.record
            .answered(stage)
            .into_iter()
            .map(str::to_owned)
            .collect()
        })
        .unwrap_or_default(),
    )
  }

  // ── Discovery state ───────────────────────────────────────────────────────

  async fn advance_stage(&self, user_id: &str, stage: Stage) -> Result<DiscoveryState> {
    self
      .mutate(user_id, move |session| {
        let from = session.state.current_stage;
        if stage < from {
          return Err(hearth_core::Error::BackwardTransition { from, to: stage }.into());
        }
        session.state.current_stage = stage;
        Ok(session.state.clone())
      })
      .await
  }

  async fn set_reschedule_pending(&self, user_id: &str, pending: bool) -> Result<()> {
    self
      .mutate(user_id, move |session| {
        session.state.reschedule_pending = pending;
        Ok(())
      })
      .await
  }

  async fn set_requested_slot(&self, user_id: &str, slot: &str) -> Result<()> {
    let slot = slot.trim().to_owned();
    self
      .mutate(user_id, move |session| {
        session.state.requested_slot = Some(slot);
        Ok(())
      })
      .await
  }

  async fn record_booking(&self, user_id: &str, booking: BookedVisit) -> Result<()> {
    self
      .mutate(user_id, move |session| {
        session.state.booking = Some(booking);
        session.state.reschedule_pending = false;
        Ok(())
      })
      .await
  }

  // ── Transcript ────────────────────────────────────────────────────────────

  async fn append_message(&self, user_id: &str, message: ChatMessage) -> Result<()> {
    let metadata_json = message
      .metadata
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let id_str  = encode_uuid(message.message_id);
    let speaker = encode_speaker(message.speaker);
    let sent_at = encode_dt(message.sent_at);
    let text    = message.text;
    let user_id = user_id.to_owned();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = load_or_insert(&tx, &user_id).and_then(|_| {
          tx.execute(
            &format!(
              "INSERT INTO messages (user_id, {MESSAGE_COLUMNS})
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            rusqlite::params![user_id, id_str, speaker, text, metadata_json, sent_at],
          )?;
          tx.execute(
            "UPDATE sessions SET updated_at = ?2 WHERE user_id = ?1",
            rusqlite::params![user_id, sent_at],
          )?;
          Ok(())
        });
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;
    outcome
  }

  async fn last_agent_metadata(&self, user_id: &str) -> Result<Option<ReplyMetadata>> {
    let user_id = user_id.to_owned();
    let raw: Option<Option<String>> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT metadata_json FROM messages
              WHERE user_id = ?1 AND speaker = 'agent'
              ORDER BY seq DESC LIMIT 1",
            rusqlite::params![user_id],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    match raw.flatten() {
      None => Ok(None),
      Some(json) => match serde_json::from_str(&json) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) => {
          tracing::warn!("ignoring unreadable reply metadata: {e}");
          Ok(None)
        }
      },
    }
  }

  async fn transcript(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
    let user_id = user_id.to_owned();
    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages WHERE user_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
