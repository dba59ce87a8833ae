//! JSON HTTP API for Hearth.
//!
//! Two routers, mounted independently:
//!
//! [`api_router`] drives conversations:
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/messages` | [`messages::post`] |
//! | `GET`  | `/sessions/{user_id}` | [`sessions::get_one`] |
//! | `GET`  | `/sessions/{user_id}/messages` | [`sessions::transcript`] |
//!
//! [`schedule_router`] is the in-process calendar provider the booking
//! client can point at:
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/schedule` | [`schedule::post`] |

pub mod error;
pub mod messages;
pub mod schedule;
pub mod sessions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use hearth_core::{
  booking::VisitBooker, export::RecordExporter, generate::TextGenerator, store::SessionStore,
};
use hearth_discovery::Orchestrator;
use hearth_schedule::calendar::Calendar;

pub use error::ApiError;

/// Build the conversation router.
pub fn api_router<S, G, B, E>(orchestrator: Arc<Orchestrator<S, G, B, E>>) -> Router<()>
where
  S: SessionStore + 'static,
  G: TextGenerator + 'static,
  B: VisitBooker + 'static,
  E: RecordExporter + 'static,
{
  Router::new()
    .route("/messages", post(messages::post::<S, G, B, E>))
    .route("/sessions/{user_id}", get(sessions::get_one::<S, G, B, E>))
    .route("/sessions/{user_id}/messages", get(sessions::transcript::<S, G, B, E>))
    .with_state(orchestrator)
}

/// Build the scheduling provider router.
pub fn schedule_router(calendar: Arc<Calendar>) -> Router<()> {
  Router::new()
    .route("/schedule", post(schedule::post))
    .with_state(calendar)
}

#[cfg(test)]
mod tests {
  use std::convert::Infallible;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use hearth_core::{
    Stage,
    booking::{BookingFailure, BookingResult, VisitBooker, VisitRequest},
    generate::CompletionRequest,
    record::ComprehensiveRecord,
    session::{Reply, Speaker},
  };
  use hearth_discovery::{DiscoveryConfig, Facility};
  use hearth_schedule::{BookingClient, BookingConfig, TimeResolver};
  use hearth_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  // ── Fakes ────────────────────────────────────────────────────────────────

  /// A model that is always down, so every reply is the canned fallback.
  struct Offline;

  impl TextGenerator for Offline {
    type Error = std::io::Error;

    async fn generate(&self, _request: CompletionRequest) -> Result<String, Self::Error> {
      Err(std::io::Error::other("offline"))
    }
  }

  struct NoBooking;

  impl VisitBooker for NoBooking {
    async fn book(&self, _request: VisitRequest) -> BookingResult {
      BookingResult::Failed(BookingFailure::network_error())
    }
  }

  struct Discard;

  impl RecordExporter for Discard {
    type Error = Infallible;

    async fn export(&self, _email: String, _record: ComprehensiveRecord) -> Result<(), Infallible> {
      Ok(())
    }
  }

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let orchestrator = Orchestrator::new(
      store,
      Offline,
      NoBooking,
      Discard,
      Facility::default(),
      DiscoveryConfig { name_probability: 0.0, ..DiscoveryConfig::default() },
    )
    .unwrap();
    api_router(Arc::new(orchestrator))
  }

  fn calendar() -> Arc<Calendar> {
    let resolver = TimeResolver::from_name("America/New_York").unwrap();
    Arc::new(Calendar::new(resolver).with_link_base("https://calendar.test"))
  }

  async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  // ── Conversation ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn first_message_asks_for_contact_details() {
    let app = app().await;
    let resp = app
      .clone()
      .oneshot(post_json("/messages", json!({"user_id": "u1", "text": "Hello"})))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let reply: Reply = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reply.metadata.stage, Stage::TrustBuilding);
    assert!(reply.text.contains("your name"), "{}", reply.text);

    let resp = app.clone().oneshot(get_req("/sessions/u1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session = body_json(resp).await;
    assert_eq!(session["user_id"], "u1");

    let resp = app.oneshot(get_req("/sessions/u1/messages")).await.unwrap();
    let messages: Vec<hearth_core::session::ChatMessage> =
      serde_json::from_value(body_json(resp).await).unwrap();
    let speakers: Vec<Speaker> = messages.iter().map(|m| m.speaker).collect();
    assert_eq!(speakers, [Speaker::User, Speaker::Agent]);
    assert_eq!(messages[1].metadata, Some(reply.metadata));
  }

  #[tokio::test]
  async fn blank_user_id_is_rejected() {
    let resp = app()
      .await
      .oneshot(post_json("/messages", json!({"user_id": "  ", "text": "Hello"})))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["ok"], false);
  }

  #[tokio::test]
  async fn unknown_session_is_404() {
    let app = app().await;
    let resp = app.clone().oneshot(get_req("/sessions/nobody")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.oneshot(get_req("/sessions/nobody/messages")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Scheduling ───────────────────────────────────────────────────────────

  fn schedule_body(key: &str, start_iso: &str) -> Value {
    json!({
      "email": "john.doe@gmail.com",
      "startIso": start_iso,
      "tz": "America/New_York",
      "roomId": "main-office",
      "agentId": "hearth",
      "durationMin": 60,
      "summary": "Community visit",
      "externalKey": key,
    })
  }

  // Wednesday, inside business hours.
  const SLOT: &str = "2030-05-08T14:00:00-04:00";

  #[tokio::test]
  async fn schedule_creates_then_reports_duplicate() {
    let app = schedule_router(calendar());

    let resp = app.clone().oneshot(post_json("/schedule", schedule_body("k1", SLOT))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = body_json(resp).await;
    assert_eq!(first["ok"], true);
    assert!(first.get("duplicate").is_none());
    assert_eq!(first["whenText"], "Wednesday, May 8 at 2:00 PM");

    let resp = app.oneshot(post_json("/schedule", schedule_body("k1", SLOT))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second = body_json(resp).await;
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["eventId"], first["eventId"]);
  }

  #[tokio::test]
  async fn header_key_overrides_body_key() {
    let cal = calendar();
    let app = schedule_router(cal.clone());

    let req = |body_key: &str| {
      let mut req = post_json("/schedule", schedule_body(body_key, SLOT));
      req.headers_mut().insert("Idempotency-Key", "from-header".parse().unwrap());
      req
    };
    app.clone().oneshot(req("a")).await.unwrap();
    let resp = app.oneshot(req("b")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["duplicate"], true);
    assert_eq!(cal.events().len(), 1);
    assert_eq!(cal.events()[0].external_key, "from-header");
  }

  #[tokio::test]
  async fn overlapping_slot_is_409() {
    let app = schedule_router(calendar());
    app.clone().oneshot(post_json("/schedule", schedule_body("k1", SLOT))).await.unwrap();

    let resp = app.oneshot(post_json("/schedule", schedule_body("k2", SLOT))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await, json!({"ok": false, "error": "conflict"}));
  }

  #[tokio::test]
  async fn bad_slots_are_rejected() {
    let app = schedule_router(calendar());

    let resp = app
      .clone()
      .oneshot(post_json("/schedule", schedule_body("k1", "2030-05-08T20:00:00-04:00")))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
      .clone()
      .oneshot(post_json("/schedule", schedule_body("k2", "next wednesday-ish")))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = schedule_body("k3", SLOT);
    body.as_object_mut().unwrap().remove("startIso");
    let resp = app.oneshot(post_json("/schedule", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["ok"], false);
  }

  #[tokio::test]
  async fn booking_client_round_trip_is_idempotent() {
    let cal = calendar();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = schedule_router(cal.clone());
    tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });

    let client = BookingClient::new(BookingConfig {
      base_url: format!("http://{addr}"),
      timeout_secs: 2,
      ..BookingConfig::default()
    })
    .unwrap();
    let request = VisitRequest {
      email:     "john.doe@gmail.com".into(),
      label:     Some("Wednesday 2pm".into()),
      start_iso: Some(SLOT.into()),
    };

    let BookingResult::Booked(first) = client.book(request.clone()).await else {
      panic!("first booking failed");
    };
    assert!(!first.duplicate);
    assert!(first.html_link.is_some());

    let BookingResult::Booked(second) = client.book(request).await else {
      panic!("repeat booking failed");
    };
    assert!(second.duplicate);
    assert_eq!(second.event_id, first.event_id);
    assert_eq!(cal.events().len(), 1);
  }
}
