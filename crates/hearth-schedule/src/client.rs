//! [`BookingClient`] — posts visit bookings to a scheduling provider.
//!
//! One request per call, never retried here. Every outcome, transport
//! failures included, comes back as a [`BookingResult`] value.

use std::time::Duration;

use hearth_core::booking::{
  BookingFailure, BookingResult, BookingSuccess, VisitBooker, VisitRequest,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
  Result,
  idempotency::{KeyParts, booking_key},
  wire::{IDEMPOTENCY_HEADER, ScheduleRequest},
};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Provider endpoint and the fixed fields sent with every booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
  /// Base URL; the client posts to `{base_url}/schedule`.
  pub base_url:     String,
  pub room_id:      String,
  pub agent_id:     String,
  pub tz:           String,
  pub duration_min: u32,
  pub create_meet:  bool,
  pub summary:      String,
  pub location:     String,
  pub timeout_secs: u64,
}

impl Default for BookingConfig {
  fn default() -> Self {
    Self {
      base_url:     "http://127.0.0.1:8080".to_owned(),
      room_id:      "main-office".to_owned(),
      agent_id:     "hearth".to_owned(),
      tz:           "America/New_York".to_owned(),
      duration_min: 60,
      create_meet:  false,
      summary:      "Community visit".to_owned(),
      location:     String::new(),
      timeout_secs: 10,
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BookingClient {
  http:   reqwest::Client,
  config: BookingConfig,
}

impl BookingClient {
  pub fn new(config: BookingConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { http, config })
  }

  pub fn config(&self) -> &BookingConfig { &self.config }

  fn endpoint(&self) -> String {
    format!("{}/schedule", self.config.base_url.trim_end_matches('/'))
  }

  /// The body sent for `request`, including its idempotency key.
  pub fn schedule_request(&self, request: &VisitRequest) -> ScheduleRequest {
    let slot = request
      .start_iso
      .as_deref()
      .or(request.label.as_deref())
      .unwrap_or_default();
    let external_key = booking_key(KeyParts {
      room_id:  &self.config.room_id,
      agent_id: &self.config.agent_id,
      email:    &request.email,
      slot,
    });
    ScheduleRequest {
      email: request.email.clone(),
      label: request.label.clone(),
      start_iso: request.start_iso.clone(),
      tz: self.config.tz.clone(),
      room_id: self.config.room_id.clone(),
      agent_id: self.config.agent_id.clone(),
      duration_min: self.config.duration_min,
      create_meet: self.config.create_meet,
      summary: self.config.summary.clone(),
      location: self.config.location.clone(),
      external_key,
    }
  }
}

impl VisitBooker for BookingClient {
  async fn book(&self, request: VisitRequest) -> BookingResult {
    let body = self.schedule_request(&request);
    tracing::debug!(key = %body.external_key, "posting visit booking");

    let response = match self
      .http
      .post(self.endpoint())
      .header(IDEMPOTENCY_HEADER, &body.external_key)
      .json(&body)
      .send()
      .await
    {
      Ok(r) => r,
      Err(e) => {
        tracing::warn!("booking request failed: {e}");
        return BookingResult::Failed(BookingFailure::network_error());
      }
    };

    let status = response.status().as_u16();
    let data = match response.bytes().await {
      Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or(Value::Null),
      Err(e) => {
        tracing::warn!("booking response body unreadable: {e}");
        return BookingResult::Failed(BookingFailure::network_error());
      }
    };

    let result = interpret_response(status, data, &request);
    match &result {
      BookingResult::Booked(b) => {
        tracing::info!(event_id = %b.event_id, duplicate = b.duplicate, "visit booked");
      }
      BookingResult::Failed(f) => {
        tracing::warn!(error = %f.error, status = ?f.status_code, "visit booking failed");
      }
    }
    result
  }
}

// ─── Response mapping ────────────────────────────────────────────────────────

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
  data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Map a provider response onto a [`BookingResult`]. Fields the provider
/// leaves out are filled from `request`.
pub fn interpret_response(status: u16, data: Value, request: &VisitRequest) -> BookingResult {
  let explicit_failure = data.get("ok").and_then(Value::as_bool) == Some(false);

  if status == 409 {
    return BookingResult::Failed(BookingFailure::conflict(Some(data)));
  }
  if !(200..300).contains(&status) || explicit_failure {
    let error = str_field(&data, "error")
      .or_else(|| str_field(&data, "message"))
      .map(str::to_owned)
      .unwrap_or_else(|| format!("HTTP {status}"));
    return BookingResult::Failed(BookingFailure {
      error,
      status_code: Some(status),
      data: Some(data),
    });
  }

  let fallback_slot = request
    .start_iso
    .clone()
    .or_else(|| request.label.clone())
    .unwrap_or_default();
  let start_iso = str_field(&data, "startIso")
    .map(str::to_owned)
    .unwrap_or_else(|| fallback_slot.clone());
  let when_text = str_field(&data, "whenText")
    .map(str::to_owned)
    .or_else(|| request.label.clone())
    .unwrap_or(fallback_slot);

  BookingResult::Booked(BookingSuccess {
    event_id: str_field(&data, "eventId").unwrap_or_default().to_owned(),
    html_link: str_field(&data, "htmlLink").map(str::to_owned),
    start_iso,
    when_text,
    duplicate: data.get("duplicate").and_then(Value::as_bool).unwrap_or(false),
  })
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::post,
  };
  use serde_json::json;

  use super::*;

  fn request() -> VisitRequest {
    VisitRequest {
      email:     "john.doe@gmail.com".into(),
      label:     Some("Wednesday 5pm".into()),
      start_iso: Some("2024-05-08T17:00:00-04:00".into()),
    }
  }

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
  }

  fn client(base_url: String) -> BookingClient {
    BookingClient::new(BookingConfig {
      base_url,
      timeout_secs: 2,
      ..BookingConfig::default()
    })
    .unwrap()
  }

  // ── Mapping ──────────────────────────────────────────────────────────────

  #[test]
  fn conflict_on_409() {
    let r = interpret_response(409, json!({"ok": false, "error": "slot taken"}), &request());
    let BookingResult::Failed(f) = r else { panic!("expected failure") };
    assert!(f.is_conflict());
    assert_eq!(f.status_code, Some(409));
  }

  #[test]
  fn generic_failure_prefers_error_then_message() {
    let BookingResult::Failed(f) =
      interpret_response(500, json!({"message": "calendar down"}), &request())
    else {
      panic!("expected failure")
    };
    assert_eq!(f.error, "calendar down");

    let BookingResult::Failed(f) = interpret_response(502, Value::Null, &request()) else {
      panic!("expected failure")
    };
    assert_eq!(f.error, "HTTP 502");
  }

  #[test]
  fn ok_false_with_2xx_is_a_failure() {
    let r = interpret_response(200, json!({"ok": false, "error": "bad email"}), &request());
    assert!(!r.is_ok());
  }

  #[test]
  fn success_fills_missing_fields_from_request() {
    let BookingResult::Booked(b) =
      interpret_response(200, json!({"ok": true, "eventId": "evt-9"}), &request())
    else {
      panic!("expected success")
    };
    assert_eq!(b.event_id, "evt-9");
    assert_eq!(b.start_iso, "2024-05-08T17:00:00-04:00");
    assert_eq!(b.when_text, "Wednesday 5pm");
    assert!(!b.duplicate);
  }

  // ── Over HTTP ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn sends_key_in_header_and_body() {
    let seen: Arc<Mutex<Vec<(String, ScheduleRequest)>>> = Arc::default();
    let sink = seen.clone();
    let router = Router::new().route(
      "/schedule",
      post(move |headers: HeaderMap, Json(body): Json<ScheduleRequest>| {
        let sink = sink.clone();
        async move {
          let key = headers
            .get(IDEMPOTENCY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
          sink.lock().unwrap().push((key, body));
          Json(json!({
            "ok": true,
            "eventId": "evt-1",
            "htmlLink": "https://calendar.example/evt-1",
            "startIso": "2024-05-08T17:00:00-04:00",
            "whenText": "Wednesday, May 8 at 5:00 PM",
          }))
        }
      }),
    );
    let c = client(serve(router).await);

    let first = c.book(request()).await;
    let second = c.book(request()).await;
    assert!(first.is_ok());
    assert!(second.is_ok());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let (key, body) = &seen[0];
    assert_eq!(key, &body.external_key);
    assert_eq!(seen[1].1.external_key, body.external_key);
    assert_eq!(body.tz, "America/New_York");
  }

  #[tokio::test]
  async fn conflict_over_http() {
    let router = Router::new().route(
      "/schedule",
      post(|| async { (StatusCode::CONFLICT, Json(json!({"ok": false, "error": "conflict"}))) }),
    );
    let c = client(serve(router).await);
    let BookingResult::Failed(f) = c.book(request()).await else {
      panic!("expected conflict")
    };
    assert!(f.is_conflict());
  }

  #[tokio::test]
  async fn unreachable_provider_is_a_network_error() {
    // Bind then drop, so nothing listens on the port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let c = client(format!("http://{addr}"));
    let BookingResult::Failed(f) = c.book(request()).await else {
      panic!("expected failure")
    };
    assert!(f.is_network_error());
  }
}
