//! Structured facts pulled out of free-form replies.
//!
//! Every extractor degrades to a safe default when the model fails or
//! answers with something unreadable.

use std::sync::LazyLock;

use chrono::Utc;
use hearth_core::{
  generate::{CompletionRequest, Purpose, TextGenerator},
  record::ContactInfo,
};
use regex::Regex;
use serde::Deserialize;

use crate::model::Model;

// ─── Contact info ────────────────────────────────────────────────────────────

const CONTACT_SYSTEM: &str = "\
Extract contact details from a family member's message to a senior living \
advisor. Answer with JSON only:
{\"name\": string|null, \"location\": string|null, \"loved_one_name\": \
string|null, \"foundName\": bool, \"foundLocation\": bool, \
\"foundLovedOneName\": bool}
name is the writer's first name. location is the city or area they live in. \
loved_one_name is the name of the person they are looking for care for. Use \
null for anything not stated; never guess.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactExtraction {
  name:                 Option<String>,
  location:             Option<String>,
  loved_one_name:       Option<String>,
  #[serde(rename = "foundName")]
  found_name:           Option<bool>,
  #[serde(rename = "foundLocation")]
  found_location:       Option<bool>,
  #[serde(rename = "foundLovedOneName")]
  found_loved_one_name: Option<bool>,
}

fn accept(value: Option<String>, found: Option<bool>) -> Option<String> {
  if found == Some(false) {
    return None;
  }
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Contact fields stated in `message`. Unstated fields are `None`.
pub async fn extract_contact<G: TextGenerator>(
  model: &Model<G>,
  message: &str,
  known: &ContactInfo,
) -> ContactInfo {
  if message.trim().is_empty() {
    return ContactInfo::default();
  }
  let user = format!(
    "Already known: name={:?}, location={:?}, loved one={:?}\nMessage: {}",
    known.name, known.location, known.loved_one_name, message.trim()
  );
  let extraction: ContactExtraction = model
    .object(CompletionRequest::new(Purpose::ExtractContact, CONTACT_SYSTEM, user))
    .await
    .unwrap_or_default();

  let mut contact = ContactInfo {
    name: accept(extraction.name, extraction.found_name),
    location: accept(extraction.location, extraction.found_location),
    loved_one_name: accept(extraction.loved_one_name, extraction.found_loved_one_name),
    ..ContactInfo::default()
  };
  let found_any =
    contact.name.is_some() || contact.location.is_some() || contact.loved_one_name.is_some();
  if found_any {
    contact.collected_at = Some(Utc::now());
  }
  contact
}

// ─── Visit agreement ─────────────────────────────────────────────────────────

const AGREEMENT_SYSTEM: &str = "\
The advisor invited the family member to visit the community in person. \
Decide whether their reply accepts. Answer with JSON only: {\"agreed\": bool, \
\"response\": string}. Treat unclear or non-committal replies as agreement; \
only a clear refusal or hesitation is false. response is a short note on \
what they said.";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgreementDecision {
  pub agreed:   bool,
  pub response: String,
}

impl Default for AgreementDecision {
  fn default() -> Self { Self { agreed: true, response: String::new() } }
}

/// Whether `message` accepts the visit invitation. Ambiguity means yes.
pub async fn detect_agreement<G: TextGenerator>(model: &Model<G>, message: &str) -> AgreementDecision {
  model
    .object(CompletionRequest::new(Purpose::VisitAgreement, AGREEMENT_SYSTEM, message.trim()))
    .await
    .unwrap_or_default()
}

// ─── Time confirmation ───────────────────────────────────────────────────────

const TIME_SYSTEM: &str = "\
The advisor proposed a visit time. Read the family member's reply and answer \
with JSON only: {\"confirmed\": bool, \"rejected\": bool, \
\"alternative_time\": string|null, \"reasoning\": string}. confirmed means \
they accept the proposed time. alternative_time is the day and time they \
suggest instead, in their own words, e.g. \"Thursday 3pm\". rejected means \
they decline without offering another time.";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeDecision {
  pub confirmed:        bool,
  pub rejected:         bool,
  pub alternative_time: Option<String>,
  pub reasoning:        String,
}

impl TimeDecision {
  pub fn alternative(&self) -> Option<&str> {
    self
      .alternative_time
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null"))
  }
}

/// How `message` answers the proposal of `proposed`.
pub async fn detect_time_confirmation<G: TextGenerator>(
  model: &Model<G>,
  proposed: &str,
  message: &str,
) -> TimeDecision {
  let user = format!("Proposed time: {proposed}\nReply: {}", message.trim());
  model
    .object(CompletionRequest::new(Purpose::TimeConfirmation, TIME_SYSTEM, user))
    .await
    .unwrap_or_default()
}

// ─── Email ───────────────────────────────────────────────────────────────────

const EMAIL_SYSTEM: &str = "\
Find the email address in the message, including spoken forms like \
\"jane dot doe at gmail dot com\". Answer with JSON only: \
{\"email\": string|null, \"reasoning\": string}. Write the address in its \
normal form, e.g. jane.doe@gmail.com.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmailExtraction {
  email: Option<String>,
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

static SPOKEN_DOT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\s+dot\s+").expect("dot regex is valid"));

static SPOKEN_AT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\s+at\s+").expect("at regex is valid"));

/// Rewrite spoken separators: `" dot "` becomes `.` and `" at "` becomes `@`.
pub fn normalize_spoken_email(text: &str) -> String {
  let dotted = SPOKEN_DOT.replace_all(text.trim(), ".");
  SPOKEN_AT.replace_all(&dotted, "@").into_owned()
}

/// The first email address written in `text`, lowercased.
pub fn find_email(text: &str) -> Option<String> {
  EMAIL.find(text).map(|m| m.as_str().trim_end_matches('.').to_lowercase())
}

/// The email address in `message`: the model's answer when it validates,
/// otherwise a regex pass over the message with spoken forms normalized.
pub async fn extract_email<G: TextGenerator>(model: &Model<G>, message: &str) -> Option<String> {
  if message.trim().is_empty() {
    return None;
  }
  let extraction: EmailExtraction = model
    .object(CompletionRequest::new(Purpose::ExtractEmail, EMAIL_SYSTEM, message.trim()))
    .await
    .unwrap_or_default();

  extraction
    .email
    .as_deref()
    .and_then(find_email)
    .or_else(|| find_email(message))
    .or_else(|| find_email(&normalize_spoken_email(message)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn spoken_email_is_normalized() {
    assert_eq!(
      find_email(&normalize_spoken_email("john dot doe at gmail dot com")).as_deref(),
      Some("john.doe@gmail.com")
    );
    assert_eq!(
      find_email(&normalize_spoken_email("It's Mary DOT Smith AT Yahoo dot co dot uk")).as_deref(),
      Some("mary.smith@yahoo.co.uk")
    );
  }

  #[test]
  fn written_email_is_found_and_lowercased() {
    assert_eq!(
      find_email("sure, it's Jane.Doe+care@Example.org.").as_deref(),
      Some("jane.doe+care@example.org")
    );
    assert_eq!(find_email("no address here"), None);
  }

  #[test]
  fn extraction_respects_found_flags() {
    assert_eq!(accept(Some("John".into()), Some(false)), None);
    assert_eq!(accept(Some(" John ".into()), None).as_deref(), Some("John"));
    assert_eq!(accept(Some("null".into()), Some(true)), None);
  }

  #[test]
  fn agreement_defaults_to_yes() {
    let d: AgreementDecision = serde_json::from_str("{\"response\": \"maybe\"}").unwrap();
    assert!(d.agreed);
  }

  #[test]
  fn blank_alternative_is_ignored() {
    let d = TimeDecision { alternative_time: Some("  ".into()), ..TimeDecision::default() };
    assert_eq!(d.alternative(), None);
  }
}
