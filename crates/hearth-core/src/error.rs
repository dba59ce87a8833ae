//! Error types for `hearth-core`.

use thiserror::Error;

use crate::stage::Stage;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid record entry: {0}")]
  InvalidEntry(String),

  #[error("cannot move stage backwards from {from} to {to}")]
  BackwardTransition { from: Stage, to: Stage },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
