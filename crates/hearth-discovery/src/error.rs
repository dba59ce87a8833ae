//! Error type for `hearth-discovery`.
//!
//! None of these reach the person on the other end of the conversation; the
//! orchestrator turns every one of them into a fallback reply.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("text generation failed: {0}")]
  Generation(#[source] BoxError),

  #[error("{0} timed out")]
  Timeout(&'static str),

  #[error("model returned no text")]
  EmptyCompletion,

  #[error("no API key configured for the model endpoint")]
  MissingApiKey,

  #[error("model endpoint returned {status}: {body}")]
  ModelStatus { status: u16, body: String },

  #[error("export failed: {0}")]
  Export(String),

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("schedule error: {0}")]
  Schedule(#[from] hearth_schedule::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub fn generation<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Generation(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
