//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Schedule(#[from] hearth_schedule::Error),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    use hearth_schedule::Error as S;
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Schedule(S::OutsideBusinessHours(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Schedule(S::Http(_) | S::InvalidLocalTime { .. }) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      ApiError::Schedule(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }
    (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
  }
}
