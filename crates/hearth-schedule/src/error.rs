//! Error type for `hearth-schedule`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown time zone: {0:?}")]
  UnknownTimeZone(String),

  #[error("{date} {hour:02}:{minute:02} does not exist in the configured time zone")]
  InvalidLocalTime { date: NaiveDate, hour: u32, minute: u32 },

  #[error("invalid timestamp: {0}")]
  InvalidTimestamp(String),

  #[error("request names neither a label nor a start time")]
  MissingSlot,

  #[error("{0} is outside business hours")]
  OutsideBusinessHours(String),

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
