//! The opaque text-generation seam.
//!
//! Every call names its [`Purpose`], which the production client logs and
//! test doubles use to pick a canned answer.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
  pub role:    Role,
  pub content: String,
}

impl PromptMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: Role::System, content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, content: content.into() }
  }
}

/// Why a generation call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
  // ── Structured (JSON) calls ─────────────────────────────────────────────
  Classify,
  ExtractContact,
  VisitAgreement,
  TimeConfirmation,
  ExtractEmail,

  // ── User-facing text ────────────────────────────────────────────────────
  ContactRequest,
  ScriptedReply,
  DigressionReply,
  NeedsMatching,
  VisitInvitation,
  Encouragement,
  Closing,
  Support,
}

impl Purpose {
  /// Whether the call must answer with a JSON object.
  pub fn expects_json(self) -> bool {
    matches!(
      self,
      Self::Classify
        | Self::ExtractContact
        | Self::VisitAgreement
        | Self::TimeConfirmation
        | Self::ExtractEmail
    )
  }
}

impl fmt::Display for Purpose {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

/// One request to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
  pub purpose:     Purpose,
  pub messages:    Vec<PromptMessage>,
  pub max_tokens:  u32,
  pub temperature: f32,
}

impl CompletionRequest {
  /// A system + user prompt pair.
  pub fn new(
    purpose: Purpose,
    system: impl Into<String>,
    user: impl Into<String>,
  ) -> Self {
    let (max_tokens, temperature) = if purpose.expects_json() {
      (200, 0.0)
    } else {
      (250, 0.7)
    };
    Self {
      purpose,
      messages: vec![PromptMessage::system(system), PromptMessage::user(user)],
      max_tokens,
      temperature,
    }
  }
}

/// Produces text for a prompt. The model behind it is opaque.
pub trait TextGenerator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn generate(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
