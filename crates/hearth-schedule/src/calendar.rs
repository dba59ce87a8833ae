//! [`Calendar`] — an in-process scheduling provider.
//!
//! It answers the same `/schedule` contract the [`crate::BookingClient`]
//! speaks: the same key returns the existing event, a clashing slot is a
//! conflict. The key check and the insert happen under one lock.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result, TimeResolver,
  time::{TimeInput, when_text},
  wire::{ScheduleRequest, ScheduleResponse},
};

/// One booked visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
  pub event_id:     String,
  pub external_key: String,
  pub email:        String,
  pub summary:      String,
  pub start:        DateTime<Utc>,
  pub end:          DateTime<Utc>,
  pub start_iso:    String,
  pub when_text:    String,
}

impl CalendarEvent {
  fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    self.start < end && start < self.end
  }
}

/// How a schedule request was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
  Created(CalendarEvent),
  /// The key was already booked; nothing new was created.
  Duplicate(CalendarEvent),
  /// Another key holds an overlapping slot.
  Conflict(CalendarEvent),
}

impl ScheduleOutcome {
  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }
}

pub struct Calendar {
  resolver:  TimeResolver,
  link_base: Option<String>,
  events:    Mutex<Vec<CalendarEvent>>,
}

impl Calendar {
  pub fn new(resolver: TimeResolver) -> Self {
    Self { resolver, link_base: None, events: Mutex::default() }
  }

  /// Events get `html_link = {base}/events/{id}`.
  pub fn with_link_base(mut self, base: impl Into<String>) -> Self {
    self.link_base = Some(base.into());
    self
  }

  pub fn events(&self) -> Vec<CalendarEvent> {
    self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn html_link(&self, event: &CalendarEvent) -> Option<String> {
    self
      .link_base
      .as_deref()
      .map(|base| format!("{}/events/{}", base.trim_end_matches('/'), event.event_id))
  }

  /// Book `request`. `key` overrides the body's `externalKey`, as the
  /// `Idempotency-Key` header does.
  pub fn schedule(
    &self,
    request: &ScheduleRequest,
    key: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<ScheduleOutcome> {
    let key = key
      .filter(|k| !k.is_empty())
      .unwrap_or(&request.external_key)
      .to_owned();
    let resolver = if request.tz.is_empty() {
      self.resolver
    } else {
      TimeResolver::from_name(&request.tz)?
    };

    let start = match (&request.start_iso, &request.label) {
      (Some(iso), _) => {
        let ts = DateTime::<FixedOffset>::parse_from_rfc3339(iso)
          .map_err(|_| Error::InvalidTimestamp(iso.clone()))?
          .with_timezone(&resolver.tz());
        if !resolver.is_in_business_window(ts) {
          return Err(Error::OutsideBusinessHours(iso.clone()));
        }
        ts
      }
      (None, Some(label)) => {
        resolver.resolve(&TimeInput::Label(label.clone()), now)?.start
      }
      (None, None) => return Err(Error::MissingSlot),
    };
    let start_utc = start.with_timezone(&Utc);
    let end_utc = start_utc + TimeDelta::minutes(i64::from(request.duration_min.max(1)));

    let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = events.iter().find(|e| e.external_key == key) {
      tracing::debug!(event_id = %existing.event_id, "duplicate booking key");
      return Ok(ScheduleOutcome::Duplicate(existing.clone()));
    }
    if let Some(clash) = events.iter().find(|e| e.overlaps(start_utc, end_utc)) {
      tracing::info!(event_id = %clash.event_id, "slot already booked");
      return Ok(ScheduleOutcome::Conflict(clash.clone()));
    }

    let event = CalendarEvent {
      event_id:     Uuid::new_v4().simple().to_string(),
      external_key: key,
      email:        request.email.clone(),
      summary:      request.summary.clone(),
      start:        start_utc,
      end:          end_utc,
      start_iso:    start.to_rfc3339(),
      when_text:    when_text(&start),
    };
    events.push(event.clone());
    tracing::info!(event_id = %event.event_id, when = %event.when_text, "event created");
    Ok(ScheduleOutcome::Created(event))
  }

  /// The wire body for `outcome`.
  pub fn response(&self, outcome: &ScheduleOutcome) -> ScheduleResponse {
    match outcome {
      ScheduleOutcome::Created(e) | ScheduleOutcome::Duplicate(e) => ScheduleResponse {
        ok:        true,
        event_id:  Some(e.event_id.clone()),
        html_link: self.html_link(e),
        start_iso: Some(e.start_iso.clone()),
        when_text: Some(e.when_text.clone()),
        duplicate: matches!(outcome, ScheduleOutcome::Duplicate(_)),
        error:     None,
      },
      ScheduleOutcome::Conflict(_) => ScheduleResponse::failure(hearth_core::booking::CONFLICT),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono_tz::America::New_York;

  use super::*;

  fn now() -> DateTime<Utc> {
    New_York
      .with_ymd_and_hms(2024, 5, 6, 9, 0, 0)
      .single()
      .unwrap()
      .with_timezone(&Utc)
  }

  fn calendar() -> Calendar {
    Calendar::new(TimeResolver::new(New_York)).with_link_base("https://cal.example")
  }

  fn request(email: &str, label: &str, key: &str) -> ScheduleRequest {
    ScheduleRequest {
      email:        email.into(),
      label:        Some(label.into()),
      start_iso:    None,
      tz:           "America/New_York".into(),
      room_id:      "room".into(),
      agent_id:     "agent".into(),
      duration_min: 60,
      create_meet:  false,
      summary:      "Visit".into(),
      location:     String::new(),
      external_key: key.into(),
    }
  }

  #[test]
  fn same_key_books_once() {
    let cal = calendar();
    let req = request("a@b.co", "Wednesday 5pm", "k1");

    let first = cal.schedule(&req, None, now()).unwrap();
    let second = cal.schedule(&req, Some("k1"), now()).unwrap();

    assert!(matches!(first, ScheduleOutcome::Created(_)));
    assert!(matches!(second, ScheduleOutcome::Duplicate(_)));
    assert_eq!(cal.events().len(), 1);

    let body = cal.response(&second);
    assert!(body.ok && body.duplicate);
    assert_eq!(
      body.html_link.unwrap(),
      format!("https://cal.example/events/{}", cal.events()[0].event_id)
    );
    assert_eq!(body.when_text.as_deref(), Some("Wednesday, May 8 at 5:00 PM"));
  }

  #[test]
  fn overlapping_slot_with_other_key_conflicts() {
    let cal = calendar();
    cal.schedule(&request("a@b.co", "Wednesday 5pm", "k1"), None, now()).unwrap();
    let clash = cal
      .schedule(&request("c@d.co", "Wed 4:30pm", "k2"), None, now())
      .unwrap();
    assert!(clash.is_conflict());
    assert_eq!(cal.events().len(), 1);

    let later = cal
      .schedule(&request("c@d.co", "Thursday 5pm", "k3"), None, now())
      .unwrap();
    assert!(matches!(later, ScheduleOutcome::Created(_)));
  }

  #[test]
  fn explicit_start_must_be_in_business_hours() {
    let cal = calendar();
    let mut req = request("a@b.co", "", "k1");
    req.label = None;
    req.start_iso = Some("2024-05-08T19:00:00-04:00".into());
    assert!(matches!(
      cal.schedule(&req, None, now()),
      Err(Error::OutsideBusinessHours(_))
    ));

    req.start_iso = Some("2024-05-08T15:00:00-04:00".into());
    let ScheduleOutcome::Created(event) = cal.schedule(&req, None, now()).unwrap() else {
      panic!("expected a new event")
    };
    assert_eq!(event.when_text, "Wednesday, May 8 at 3:00 PM");
  }

  #[test]
  fn request_without_slot_is_rejected() {
    let mut req = request("a@b.co", "", "k1");
    req.label = None;
    assert!(matches!(calendar().schedule(&req, None, now()), Err(Error::MissingSlot)));
  }
}
