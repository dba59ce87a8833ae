//! Booking results and the seam to the scheduling provider.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Error string reserved for an HTTP 409 from the provider.
pub const CONFLICT: &str = "conflict";
/// Error string for transport failures and timeouts.
pub const NETWORK_ERROR: &str = "network_error";

/// What the conversation asks the provider to book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRequest {
  pub email:     String,
  /// The slot as the user phrased it, e.g. "Wednesday 5pm".
  pub label:     Option<String>,
  /// The resolved start instant, when one could be computed.
  pub start_iso: Option<String>,
}

/// A created (or previously created) calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSuccess {
  pub event_id:  String,
  pub html_link: Option<String>,
  pub start_iso: String,
  pub when_text: String,
  /// The provider already had an event for this idempotency key.
  #[serde(default)]
  pub duplicate: bool,
}

/// A booking that did not go through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFailure {
  pub error:       String,
  pub status_code: Option<u16>,
  pub data:        Option<serde_json::Value>,
}

impl BookingFailure {
  pub fn network_error() -> Self {
    Self { error: NETWORK_ERROR.to_owned(), status_code: None, data: None }
  }

  pub fn conflict(data: Option<serde_json::Value>) -> Self {
    Self { error: CONFLICT.to_owned(), status_code: Some(409), data }
  }

  pub fn is_conflict(&self) -> bool { self.error == CONFLICT }

  pub fn is_network_error(&self) -> bool { self.error == NETWORK_ERROR }
}

/// Outcome of one booking attempt. Failures are values, not errors: the
/// caller branches on them to choose the next conversational move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookingResult {
  Booked(BookingSuccess),
  Failed(BookingFailure),
}

impl BookingResult {
  pub fn is_ok(&self) -> bool { matches!(self, Self::Booked(_)) }
}

/// Books visits with an external scheduling provider.
pub trait VisitBooker: Send + Sync {
  /// Attempt a single booking. Never retries on its own.
  fn book(
    &self,
    request: VisitRequest,
  ) -> impl Future<Output = BookingResult> + Send + '_;
}
