//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sessions/{user_id}` | 404 if the user never wrote |
//! | `GET`  | `/sessions/{user_id}/messages` | Transcript, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use hearth_core::{
  booking::VisitBooker,
  export::RecordExporter,
  generate::TextGenerator,
  session::{ChatMessage, UserSession},
  store::SessionStore,
};
use hearth_discovery::Orchestrator;

use crate::error::ApiError;

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /sessions/{user_id}`
pub async fn get_one<S, G, B, E>(
  State(orchestrator): State<Arc<Orchestrator<S, G, B, E>>>,
  Path(user_id): Path<String>,
) -> Result<Json<UserSession>, ApiError>
where
  S: SessionStore + 'static,
  G: TextGenerator + 'static,
  B: VisitBooker + 'static,
  E: RecordExporter + 'static,
{
  orchestrator
    .store()
    .get(&user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("session {user_id}")))
}

// ─── Transcript ───────────────────────────────────────────────────────────────

/// `GET /sessions/{user_id}/messages`
pub async fn transcript<S, G, B, E>(
  State(orchestrator): State<Arc<Orchestrator<S, G, B, E>>>,
  Path(user_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError>
where
  S: SessionStore + 'static,
  G: TextGenerator + 'static,
  B: VisitBooker + 'static,
  E: RecordExporter + 'static,
{
  let store = orchestrator.store();
  let exists = store
    .get(&user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_some();
  if !exists {
    return Err(ApiError::NotFound(format!("session {user_id}")));
  }
  let messages = store
    .transcript(&user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(messages))
}
