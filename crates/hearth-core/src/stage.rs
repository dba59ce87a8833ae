//! Discovery stages and their required questions.
//!
//! A conversation walks the stages in a fixed forward order. Each questioning
//! stage owns a short list of canonical questions; a stage is complete once
//! every one of them has an answer in the user's record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::QaSection;

/// One of the seven ordered phases of the scripted discovery conversation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  #[default]
  TrustBuilding,
  SituationDiscovery,
  LifestyleDiscovery,
  ReadinessDiscovery,
  PrioritiesDiscovery,
  NeedsMatching,
  ScheduleVisit,
}

impl Stage {
  /// Every stage, in conversation order.
  pub const ALL: [Stage; 7] = [
    Stage::TrustBuilding,
    Stage::SituationDiscovery,
    Stage::LifestyleDiscovery,
    Stage::ReadinessDiscovery,
    Stage::PrioritiesDiscovery,
    Stage::NeedsMatching,
    Stage::ScheduleVisit,
  ];

  /// The stage that follows this one. `ScheduleVisit` has no successor; it
  /// keeps answering follow-ups through its own sub-machine.
  pub fn next(self) -> Option<Stage> {
    let idx = Self::ALL.iter().position(|s| *s == self)?;
    Self::ALL.get(idx + 1).copied()
  }

  /// The snake_case name used in reply metadata and storage.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::TrustBuilding => "trust_building",
      Self::SituationDiscovery => "situation_discovery",
      Self::LifestyleDiscovery => "lifestyle_discovery",
      Self::ReadinessDiscovery => "readiness_discovery",
      Self::PrioritiesDiscovery => "priorities_discovery",
      Self::NeedsMatching => "needs_matching",
      Self::ScheduleVisit => "schedule_visit",
    }
  }

  /// The Q&A list of the comprehensive record this stage writes into, if any.
  pub fn section(self) -> Option<QaSection> {
    match self {
      Self::SituationDiscovery => Some(QaSection::Situation),
      Self::LifestyleDiscovery => Some(QaSection::Lifestyle),
      Self::ReadinessDiscovery => Some(QaSection::Readiness),
      Self::PrioritiesDiscovery => Some(QaSection::Priorities),
      Self::ScheduleVisit => Some(QaSection::VisitScheduling),
      Self::TrustBuilding | Self::NeedsMatching => None,
    }
  }

  /// The canonical questions a stage must collect before it advances.
  ///
  /// Empty for `TrustBuilding` (which gates on contact info instead),
  /// `NeedsMatching` (one round trip) and `ScheduleVisit` (driven by the
  /// visit sub-machine markers).
  pub fn required_questions(self) -> &'static [&'static str] {
    match self {
      Self::SituationDiscovery => &[
        "What made you decide to reach out today?",
        "What is your biggest concern about your loved one right now?",
        "Where is your loved one living at the moment?",
        "How is this situation affecting you and your family?",
      ],
      Self::LifestyleDiscovery => &[
        "What does a typical day look like for your loved one?",
        "What activities or hobbies do they enjoy?",
        "What are they most proud of in their life?",
      ],
      Self::ReadinessDiscovery => &[
        "Is your loved one aware that you are looking into options?",
        "How do they feel about the idea of moving?",
        "Who else is involved in making this decision?",
      ],
      Self::PrioritiesDiscovery => &[
        "What matters most to you in a community?",
        "What would make you feel confident about a new home for them?",
        "Do you have a timeline in mind for a move?",
      ],
      Self::TrustBuilding | Self::NeedsMatching | Self::ScheduleVisit => &[],
    }
  }

  /// Required questions not yet present in `answered`, in script order.
  pub fn remaining_questions<'a, I>(self, answered: I) -> Vec<&'static str>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let answered: Vec<&str> = answered.into_iter().collect();
    self
      .required_questions()
      .iter()
      .copied()
      .filter(|q| !answered.contains(q))
      .collect()
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
