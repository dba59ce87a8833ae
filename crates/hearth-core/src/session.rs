//! Sessions, discovery state and the conversation transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{record::ComprehensiveRecord, stage::Stage};

// ─── Discovery state ─────────────────────────────────────────────────────────

/// A calendar event booked for the user's visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedVisit {
  pub event_id:  String,
  pub html_link: Option<String>,
  pub start_iso: String,
  pub when_text: String,
}

/// Where the user is in the discovery script.
///
/// `current_stage` only ever moves forward. The reply metadata in the
/// transcript is the preferred source for the stage; this field is the
/// fallback when no agent message has been recorded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryState {
  pub current_stage:      Stage,
  /// A booking hit a slot conflict and the user was asked for another time.
  #[serde(default)]
  pub reschedule_pending: bool,
  /// The time the user asked for when rescheduling, kept even if that
  /// booking never lands.
  #[serde(default)]
  pub requested_slot:     Option<String>,
  #[serde(default)]
  pub booking:            Option<BookedVisit>,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Everything the store holds for one user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
  pub user_id:    String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub record:     ComprehensiveRecord,
  pub state:      DiscoveryState,
}

impl UserSession {
  pub fn new(user_id: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      user_id:    user_id.into(),
      created_at: now,
      updated_at: now,
      record:     ComprehensiveRecord::default(),
      state:      DiscoveryState::default(),
    }
  }
}

// ─── Transcript ──────────────────────────────────────────────────────────────

/// How a reply was produced. Serialised with the labels the classifier
/// speaks, so the metadata reads the same as the classification output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseStatus {
  #[default]
  #[serde(rename = "Normal situation")]
  Normal,
  #[serde(rename = "Unexpected situation")]
  Unexpected,
  /// A handler failed and a canned reply was used.
  #[serde(rename = "Fallback")]
  Fallback,
}

/// Metadata attached to every agent reply. The stage recorded here is what
/// the orchestrator reads back on the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMetadata {
  pub stage:           Stage,
  pub response_status: ResponseStatus,
}

/// The result of one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
  pub text:     String,
  pub metadata: ReplyMetadata,
}

/// Who sent a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
  User,
  Agent,
}

/// One message of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub message_id: Uuid,
  pub speaker:    Speaker,
  pub text:       String,
  /// Present on agent messages only.
  pub metadata:   Option<ReplyMetadata>,
  pub sent_at:    DateTime<Utc>,
}

impl ChatMessage {
  pub fn user(text: impl Into<String>) -> Self {
    Self {
      message_id: Uuid::new_v4(),
      speaker:    Speaker::User,
      text:       text.into(),
      metadata:   None,
      sent_at:    Utc::now(),
    }
  }

  pub fn agent(reply: &Reply) -> Self {
    Self {
      message_id: Uuid::new_v4(),
      speaker:    Speaker::Agent,
      text:       reply.text.clone(),
      metadata:   Some(reply.metadata),
      sent_at:    Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn metadata_serialises_with_classifier_labels() {
    let meta = ReplyMetadata {
      stage:           Stage::LifestyleDiscovery,
      response_status: ResponseStatus::Unexpected,
    };
    let json = serde_json::to_value(meta).unwrap();
    assert_eq!(json["stage"], "lifestyle_discovery");
    assert_eq!(json["responseStatus"], "Unexpected situation");
  }

  #[test]
  fn older_state_without_flags_still_decodes() {
    let state: DiscoveryState =
      serde_json::from_str(r#"{"current_stage":"needs_matching"}"#).unwrap();
    assert_eq!(state.current_stage, Stage::NeedsMatching);
    assert!(!state.reschedule_pending);
    assert!(state.booking.is_none());
  }
}
