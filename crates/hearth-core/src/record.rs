//! The comprehensive record — everything learned about one user.
//!
//! The record is append-only. Q&A entries are never edited or removed; a new
//! entry is appended only if no entry with the same `question` exists in its
//! list. Contact fields merge last-non-null-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, stage::Stage};

// ─── Contact info ────────────────────────────────────────────────────────────

/// Who the user is and who they are asking for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
  pub name:           Option<String>,
  pub location:       Option<String>,
  pub loved_one_name: Option<String>,
  pub email:          Option<String>,
  pub collected_at:   Option<DateTime<Utc>>,
}

impl ContactInfo {
  /// Overwrite each field with the incoming value when that value is present
  /// and non-blank. Returns `true` if anything changed.
  pub fn merge(&mut self, incoming: ContactInfo) -> bool {
    let mut changed = false;
    changed |= merge_field(&mut self.name, incoming.name);
    changed |= merge_field(&mut self.location, incoming.location);
    changed |= merge_field(&mut self.loved_one_name, incoming.loved_one_name);
    changed |= merge_field(&mut self.email, incoming.email);
    if let Some(at) = incoming.collected_at
      && self.collected_at != Some(at)
    {
      self.collected_at = Some(at);
      changed = true;
    }
    changed
  }

  /// Which of name, location and loved-one name are still unknown.
  pub fn missing(&self) -> Vec<ContactField> {
    let mut out = Vec::new();
    if self.name.is_none() {
      out.push(ContactField::Name);
    }
    if self.location.is_none() {
      out.push(ContactField::Location);
    }
    if self.loved_one_name.is_none() {
      out.push(ContactField::LovedOneName);
    }
    out
  }

  pub fn is_complete(&self) -> bool { self.missing().is_empty() }
}

fn merge_field(slot: &mut Option<String>, incoming: Option<String>) -> bool {
  match incoming.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()) {
    Some(v) if slot.as_deref() != Some(v.as_str()) => {
      *slot = Some(v);
      true
    }
    _ => false,
  }
}

/// The three facts trust building has to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
  Name,
  Location,
  LovedOneName,
}

impl ContactField {
  /// Human phrasing used when asking for the field.
  pub fn describe(self) -> &'static str {
    match self {
      Self::Name => "your name",
      Self::Location => "where you are located",
      Self::LovedOneName => "your loved one's name",
    }
  }
}

// ─── Q&A entries ─────────────────────────────────────────────────────────────

/// The five question lists of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaSection {
  Situation,
  Lifestyle,
  Readiness,
  Priorities,
  VisitScheduling,
}

impl QaSection {
  pub const ALL: [QaSection; 5] = [
    QaSection::Situation,
    QaSection::Lifestyle,
    QaSection::Readiness,
    QaSection::Priorities,
    QaSection::VisitScheduling,
  ];

  /// The stage that owns this list.
  pub fn stage(self) -> Stage {
    match self {
      Self::Situation => Stage::SituationDiscovery,
      Self::Lifestyle => Stage::LifestyleDiscovery,
      Self::Readiness => Stage::ReadinessDiscovery,
      Self::Priorities => Stage::PrioritiesDiscovery,
      Self::VisitScheduling => Stage::ScheduleVisit,
    }
  }
}

/// One answered question. Unique per list by `question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
  pub question:  String,
  pub answer:    String,
  pub stage:     Stage,
  pub timestamp: DateTime<Utc>,
}

impl QaEntry {
  pub fn new(
    stage: Stage,
    question: impl Into<String>,
    answer: impl Into<String>,
  ) -> Self {
    Self {
      question: question.into(),
      answer: answer.into(),
      stage,
      timestamp: Utc::now(),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The accumulated, deduplicated facts collected for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComprehensiveRecord {
  pub contact_info:     ContactInfo,
  pub situation:        Vec<QaEntry>,
  pub lifestyle:        Vec<QaEntry>,
  pub readiness:        Vec<QaEntry>,
  pub priorities:       Vec<QaEntry>,
  pub visit_scheduling: Vec<QaEntry>,
  pub last_updated:     Option<DateTime<Utc>>,
}

impl ComprehensiveRecord {
  pub fn section(&self, section: QaSection) -> &[QaEntry] {
    match section {
      QaSection::Situation => &self.situation,
      QaSection::Lifestyle => &self.lifestyle,
      QaSection::Readiness => &self.readiness,
      QaSection::Priorities => &self.priorities,
      QaSection::VisitScheduling => &self.visit_scheduling,
    }
  }

  fn section_mut(&mut self, section: QaSection) -> &mut Vec<QaEntry> {
    match section {
      QaSection::Situation => &mut self.situation,
      QaSection::Lifestyle => &mut self.lifestyle,
      QaSection::Readiness => &mut self.readiness,
      QaSection::Priorities => &mut self.priorities,
      QaSection::VisitScheduling => &mut self.visit_scheduling,
    }
  }

  /// The questions answered so far for `stage`, in insertion order. Stages
  /// without a list have nothing answered.
  pub fn answered(&self, stage: Stage) -> Vec<&str> {
    stage
      .section()
      .map(|s| self.section(s).iter().map(|e| e.question.as_str()).collect())
      .unwrap_or_default()
  }

  /// Look up the answer to `question` within `stage`'s list.
  pub fn answer_to(&self, stage: Stage, question: &str) -> Option<&str> {
    let section = stage.section()?;
    self
      .section(section)
      .iter()
      .find(|e| e.question == question)
      .map(|e| e.answer.as_str())
  }

  /// Append `entry` to the list owned by its stage unless the question is
  /// already present. Returns `true` when appended.
  pub fn push_entry(&mut self, entry: QaEntry) -> Result<bool> {
    let section = validate_entry(&entry)?;
    let list = self.section_mut(section);
    if list.iter().any(|e| e.question == entry.question) {
      return Ok(false);
    }
    list.push(entry);
    self.last_updated = Some(Utc::now());
    Ok(true)
  }

  /// Merge a partial record. Contact info merges last-non-null-wins, every
  /// list is appended to with a duplicate check. Merging the same update
  /// twice is a no-op the second time. Returns the number of new entries.
  pub fn merge(&mut self, update: RecordUpdate) -> Result<usize> {
    // Validate everything first so a bad payload leaves the record untouched.
    for (section, entries) in update.sections() {
      for entry in entries {
        if validate_entry(entry)? != section {
          return Err(Error::InvalidEntry(format!(
            "entry {:?} for stage {} placed in the {section:?} list",
            entry.question, entry.stage
          )));
        }
      }
    }

    let mut appended = 0;
    if let Some(contact) = update.contact_info {
      self.contact_info.merge(contact);
    }
    for entry in update
      .situation
      .into_iter()
      .chain(update.lifestyle)
      .chain(update.readiness)
      .chain(update.priorities)
      .chain(update.visit_scheduling)
    {
      if self.push_entry(entry)? {
        appended += 1;
      }
    }
    self.last_updated = Some(Utc::now());
    Ok(appended)
  }

  /// Every answered question across all lists, in stage order.
  pub fn all_entries(&self) -> impl Iterator<Item = &QaEntry> {
    QaSection::ALL.into_iter().flat_map(|s| self.section(s).iter())
  }
}

fn validate_entry(entry: &QaEntry) -> Result<QaSection> {
  if entry.question.trim().is_empty() {
    return Err(Error::InvalidEntry("question must not be empty".into()));
  }
  entry.stage.section().ok_or_else(|| {
    Error::InvalidEntry(format!("stage {} has no question list", entry.stage))
  })
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// A partial record to merge via
/// [`SessionStore::update_record`](crate::store::SessionStore::update_record).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordUpdate {
  pub contact_info:     Option<ContactInfo>,
  pub situation:        Vec<QaEntry>,
  pub lifestyle:        Vec<QaEntry>,
  pub readiness:        Vec<QaEntry>,
  pub priorities:       Vec<QaEntry>,
  pub visit_scheduling: Vec<QaEntry>,
}

impl RecordUpdate {
  pub fn contact(contact: ContactInfo) -> Self {
    Self { contact_info: Some(contact), ..Self::default() }
  }

  /// A single entry routed to the list its stage owns.
  pub fn entry(entry: QaEntry) -> Result<Self> {
    let mut update = Self::default();
    match validate_entry(&entry)? {
      QaSection::Situation => update.situation.push(entry),
      QaSection::Lifestyle => update.lifestyle.push(entry),
      QaSection::Readiness => update.readiness.push(entry),
      QaSection::Priorities => update.priorities.push(entry),
      QaSection::VisitScheduling => update.visit_scheduling.push(entry),
    }
    Ok(update)
  }

  fn sections(&self) -> [(QaSection, &Vec<QaEntry>); 5] {
    [
      (QaSection::Situation, &self.situation),
      (QaSection::Lifestyle, &self.lifestyle),
      (QaSection::Readiness, &self.readiness),
      (QaSection::Priorities, &self.priorities),
      (QaSection::VisitScheduling, &self.visit_scheduling),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn situation(q: &str, a: &str) -> QaEntry {
    QaEntry::new(Stage::SituationDiscovery, q, a)
  }

  #[test]
  fn merging_the_same_payload_twice_is_idempotent() {
    let payload = RecordUpdate {
      situation: vec![situation("q1", "a1"), situation("q2", "a2")],
      lifestyle: vec![QaEntry::new(Stage::LifestyleDiscovery, "q3", "a3")],
      ..RecordUpdate::default()
    };

    let mut record = ComprehensiveRecord::default();
    assert_eq!(record.merge(payload.clone()).unwrap(), 3);
    assert_eq!(record.merge(payload).unwrap(), 0);

    assert_eq!(record.situation.len(), 2);
    assert_eq!(record.lifestyle.len(), 1);
  }

  #[test]
  fn duplicate_question_keeps_first_answer() {
    let mut record = ComprehensiveRecord::default();
    assert!(record.push_entry(situation("q1", "first")).unwrap());
    assert!(!record.push_entry(situation("q1", "second")).unwrap());
    assert_eq!(
      record.answer_to(Stage::SituationDiscovery, "q1"),
      Some("first")
    );
  }

  #[test]
  fn contact_merge_is_last_non_null_wins() {
    let mut contact = ContactInfo {
      name: Some("John".into()),
      location: Some("Tampa".into()),
      ..ContactInfo::default()
    };
    let changed = contact.merge(ContactInfo {
      name: None,
      location: Some("Orlando".into()),
      loved_one_name: Some("  ".into()),
      ..ContactInfo::default()
    });
    assert!(changed);
    assert_eq!(contact.name.as_deref(), Some("John"));
    assert_eq!(contact.location.as_deref(), Some("Orlando"));
    assert_eq!(contact.loved_one_name, None);
    assert_eq!(contact.missing(), vec![ContactField::LovedOneName]);
  }

  #[test]
  fn misplaced_entries_are_rejected_without_partial_writes() {
    let mut record = ComprehensiveRecord::default();
    let bad = RecordUpdate {
      situation: vec![
        situation("q1", "a1"),
        QaEntry::new(Stage::LifestyleDiscovery, "q2", "a2"),
      ],
      ..RecordUpdate::default()
    };
    assert!(matches!(record.merge(bad), Err(Error::InvalidEntry(_))));
    assert!(record.situation.is_empty());
  }

  #[test]
  fn stages_without_lists_cannot_hold_entries() {
    let entry = QaEntry::new(Stage::NeedsMatching, "q", "a");
    assert!(RecordUpdate::entry(entry).is_err());
  }

  #[test]
  fn raw_payload_deserializes_with_missing_lists() {
    let raw = serde_json::json!({
      "contact_info": { "name": "John" },
      "priorities": [{
        "question": "q", "answer": "a",
        "stage": "priorities_discovery",
        "timestamp": "2024-01-01T00:00:00Z"
      }]
    });
    let update: RecordUpdate = serde_json::from_value(raw).unwrap();
    assert_eq!(update.priorities.len(), 1);
    assert!(update.situation.is_empty());
  }
}
