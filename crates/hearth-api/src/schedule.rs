//! `POST /schedule` — the in-process calendar provider.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::Utc;
use hearth_schedule::{
  calendar::{Calendar, ScheduleOutcome},
  wire::{IDEMPOTENCY_HEADER, ScheduleRequest},
};

use crate::error::ApiError;

/// `POST /schedule` — 201 for a new event, 200 for a repeated key, 409 when
/// another booking holds the slot.
pub async fn post(
  State(calendar): State<Arc<Calendar>>,
  headers: HeaderMap,
  Json(body): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
  if body.email.trim().is_empty() {
    return Err(ApiError::BadRequest("email must not be empty".into()));
  }
  let key = headers.get(IDEMPOTENCY_HEADER).and_then(|v| v.to_str().ok());
  let outcome = calendar.schedule(&body, key, Utc::now())?;

  let status = match outcome {
    ScheduleOutcome::Created(_) => StatusCode::CREATED,
    ScheduleOutcome::Duplicate(_) => StatusCode::OK,
    ScheduleOutcome::Conflict(_) => StatusCode::CONFLICT,
  };
  Ok((status, Json(calendar.response(&outcome))))
}
