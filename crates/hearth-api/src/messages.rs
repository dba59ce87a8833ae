//! `POST /messages` — one conversational turn.

use std::sync::Arc;

use axum::{Json, extract::State};
use hearth_core::{
  booking::VisitBooker, export::RecordExporter, generate::TextGenerator, session::Reply,
  store::SessionStore,
};
use hearth_discovery::Orchestrator;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
  pub user_id: String,
  #[serde(default)]
  pub text:    String,
}

/// `POST /messages` — body: `{"user_id":"u1","text":"Hello"}`
///
/// Always answers with a reply; conversation failures surface as fallback
/// text, never as an HTTP error.
pub async fn post<S, G, B, E>(
  State(orchestrator): State<Arc<Orchestrator<S, G, B, E>>>,
  Json(body): Json<MessageBody>,
) -> Result<Json<Reply>, ApiError>
where
  S: SessionStore + 'static,
  G: TextGenerator + 'static,
  B: VisitBooker + 'static,
  E: RecordExporter + 'static,
{
  let user_id = body.user_id.trim();
  if user_id.is_empty() {
    return Err(ApiError::BadRequest("user_id must not be empty".into()));
  }
  let reply = orchestrator.handle_message(user_id, &body.text).await;
  Ok(Json(reply))
}
