//! JSON shapes of the `/schedule` endpoint, shared by the client and the
//! in-process calendar.

use serde::{Deserialize, Serialize};

/// Header carrying the booking key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Body of `POST /schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
  pub email:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_iso:    Option<String>,
  pub tz:           String,
  pub room_id:      String,
  pub agent_id:     String,
  pub duration_min: u32,
  #[serde(default)]
  pub create_meet:  bool,
  pub summary:      String,
  #[serde(default)]
  pub location:     String,
  pub external_key: String,
}

/// Body of every `/schedule` response. Failures set `ok: false` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
  pub ok:        bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_id:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub html_link: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_iso: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when_text: Option<String>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub duplicate: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:     Option<String>,
}

impl ScheduleResponse {
  pub fn failure(error: impl Into<String>) -> Self {
    Self { ok: false, error: Some(error.into()), ..Self::default() }
  }
}
