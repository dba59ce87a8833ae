//! Derived progress through the visit-scheduling sub-machine.
//!
//! The step is never stored. It is recomputed from which marker questions are
//! present in the `visit_scheduling` list, so a partially written record still
//! lands on a sensible step.

use serde::{Deserialize, Serialize};

use crate::record::QaEntry;

pub const VISIT_AGREEMENT: &str = "visit_agreement";
pub const TIME_CONFIRMATION: &str = "time_confirmation";
pub const EMAIL_COLLECTION: &str = "email_collection";
pub const REFERRAL_SOURCE: &str = "referral_source";

/// Markers in step order; the marker at index `i` completes step `i + 1`.
pub const MARKERS: [&str; 4] =
  [VISIT_AGREEMENT, TIME_CONFIRMATION, EMAIL_COLLECTION, REFERRAL_SOURCE];

/// The five steps of visit scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStep {
  Agreement,
  TimeConfirmation,
  EmailCollection,
  ReferralSource,
  Close,
}

impl VisitStep {
  /// 1-based step number.
  pub fn number(self) -> u8 {
    match self {
      Self::Agreement => 1,
      Self::TimeConfirmation => 2,
      Self::EmailCollection => 3,
      Self::ReferralSource => 4,
      Self::Close => 5,
    }
  }

  fn from_number(n: usize) -> Self {
    match n {
      0 | 1 => Self::Agreement,
      2 => Self::TimeConfirmation,
      3 => Self::EmailCollection,
      4 => Self::ReferralSource,
      _ => Self::Close,
    }
  }

  /// The marker that completes this step, if the step has one.
  pub fn marker(self) -> Option<&'static str> {
    MARKERS.get(usize::from(self.number()) - 1).copied()
  }
}

/// Compute the current step: one past the highest marker present.
pub fn visit_step(entries: &[QaEntry]) -> VisitStep {
  let highest = MARKERS
    .iter()
    .rposition(|m| entries.iter().any(|e| e.question == *m))
    .map(|i| i + 1)
    .unwrap_or(0);
  VisitStep::from_number(highest + 1)
}
