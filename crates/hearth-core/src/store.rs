//! The `SessionStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `hearth-store-sqlite`).
//! The orchestrator depends on this abstraction, never on a concrete backend,
//! and never mutates a session's fields directly.

use std::future::Future;

use crate::{
  record::{ComprehensiveRecord, RecordUpdate},
  session::{BookedVisit, ChatMessage, DiscoveryState, ReplyMetadata, UserSession},
  stage::Stage,
};

/// Abstraction over the per-user record store.
///
/// Nothing is ever deleted. Q&A writes are dedupe-checked appends; contact
/// info merges last-non-null-wins; the stage only moves forward.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Load the session for `user_id`, creating an empty one on first contact.
  fn get_or_create<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<UserSession, Self::Error>> + Send + 'a;

  /// Load the session for `user_id` without creating it.
  fn get<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<UserSession>, Self::Error>> + Send + 'a;

  // ── Record — append-only writes ───────────────────────────────────────

  /// Merge a partial record and return the merged result. Recomputes
  /// `last_updated`.
  fn update_record<'a>(
    &'a self,
    user_id: &'a str,
    update: RecordUpdate,
  ) -> impl Future<Output = Result<ComprehensiveRecord, Self::Error>> + Send + 'a;

  /// Append one answer to `stage`'s list unless `question` is already there.
  /// Returns `true` when the entry was appended.
  fn add_qa_entry<'a>(
    &'a self,
    user_id: &'a str,
    stage: Stage,
    question: &'a str,
    answer: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// The questions already answered for `stage`.
  fn answered_questions<'a>(
    &'a self,
    user_id: &'a str,
    stage: Stage,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  // ── Discovery state ───────────────────────────────────────────────────

  /// Move `current_stage` to `stage`. Moving to the current stage is a no-op;
  /// moving backwards is an error.
  fn advance_stage<'a>(
    &'a self,
    user_id: &'a str,
    stage: Stage,
  ) -> impl Future<Output = Result<DiscoveryState, Self::Error>> + Send + 'a;

  fn set_reschedule_pending<'a>(
    &'a self,
    user_id: &'a str,
    pending: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn set_requested_slot<'a>(
    &'a self,
    user_id: &'a str,
    slot: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn record_booking<'a>(
    &'a self,
    user_id: &'a str,
    booking: BookedVisit,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Transcript ────────────────────────────────────────────────────────

  fn append_message<'a>(
    &'a self,
    user_id: &'a str,
    message: ChatMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Metadata of the most recent agent message, if any.
  fn last_agent_metadata<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<ReplyMetadata>, Self::Error>> + Send + 'a;

  /// Every message for `user_id`, oldest first.
  fn transcript<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + 'a;
}
