//! The Normal / Unexpected gate.
//!
//! Normal replies continue the script. Unexpected ones (questions, pricing or
//! amenity inquiries, pacing complaints, unprompted stories about the loved
//! one) get a digression reply before the script resumes.

use hearth_core::{
  Stage,
  generate::{CompletionRequest, Purpose, TextGenerator},
  session::ResponseStatus,
};
use serde::Deserialize;

use crate::model::Model;

const SYSTEM: &str = "\
You classify one message from a family member talking to a senior living \
advisor. Answer with JSON only: {\"status\": \"Normal situation\"} or \
{\"status\": \"Unexpected situation\"}.

Unexpected situation when the message:
- asks a question of its own;
- asks about pricing, costs, amenities, services, policies or visiting;
- complains about the pace or the number of questions;
- volunteers the loved one's preferences, hobbies or personality without \
being asked.

Otherwise it is a Normal situation, including short or vague answers.";

#[derive(Debug, Deserialize)]
struct Verdict {
  status: String,
}

/// What the classifier needs to know about the turn.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyInput<'a> {
  pub stage:    Stage,
  /// The question the message answers, if the script asked one.
  pub question: Option<&'a str>,
  pub message:  &'a str,
}

/// Classify `input.message`. Empty messages, failed calls and unreadable
/// output are all Normal.
pub async fn classify<G: TextGenerator>(model: &Model<G>, input: ClassifyInput<'_>) -> ResponseStatus {
  if input.message.trim().is_empty() {
    return ResponseStatus::Normal;
  }

  let user = format!(
    "Conversation stage: {}\nQuestion asked: {}\nMessage: {}",
    input.stage,
    input.question.unwrap_or("(none)"),
    input.message.trim(),
  );
  let verdict: Option<Verdict> = model
    .object(CompletionRequest::new(Purpose::Classify, SYSTEM, user))
    .await;

  let status = match verdict.as_ref().map(|v| v.status.trim()) {
    Some(s) if s.eq_ignore_ascii_case("Unexpected situation") => ResponseStatus::Unexpected,
    _ => ResponseStatus::Normal,
  };
  tracing::debug!(stage = %input.stage, ?status, "classified message");
  status
}
