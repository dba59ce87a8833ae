//! Resolving vague day/time phrases into concrete visit slots.
//!
//! Visits happen Monday to Friday, 10:00 to 17:00 local time, and never less
//! than 48 hours after the request. Every adjustment moves the candidate
//! forward, so resolution always terminates.

use std::{str::FromStr, sync::LazyLock};

use chrono::{
  DateTime, Datelike, Days, FixedOffset, NaiveDate, TimeDelta, TimeZone, Timelike,
  Utc, Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

use crate::{Error, Result};

/// Opening hour of the business window.
pub const OPEN_HOUR: u32 = 10;
/// Closing hour; 17:00 itself is the last bookable start.
pub const CLOSE_HOUR: u32 = 17;
/// Hour used when a label names no time at all.
pub const DEFAULT_HOUR: u32 = 14;
/// Minimum gap between the request and the visit.
pub const LEAD_TIME_HOURS: i64 = 48;

// ─── Input ───────────────────────────────────────────────────────────────────

/// What the caller knows about the desired slot.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
  /// An explicit instant, e.g. from a calendar picker.
  Timestamp(DateTime<FixedOffset>),
  /// Free text such as "Wednesday afternoon" or "Fri 10am".
  Label(String),
}

impl TimeInput {
  /// RFC 3339 strings become timestamps; anything else is a label.
  pub fn parse(raw: &str) -> Self {
    match DateTime::parse_from_rfc3339(raw.trim()) {
      Ok(ts) => Self::Timestamp(ts),
      Err(_) => Self::Label(raw.to_owned()),
    }
  }
}

// ─── Label parsing ───────────────────────────────────────────────────────────

/// The pieces extracted from a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLabel {
  pub weekday: Option<Weekday>,
  pub hour:    u32,
  pub minute:  u32,
}

fn weekday_alias(token: &str) -> Option<Weekday> {
  let day = match token {
    "mon" | "monday" => Weekday::Mon,
    "tue" | "tues" | "tuesday" => Weekday::Tue,
    "wed" | "weds" | "wednesday" => Weekday::Wed,
    "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
    "fri" | "friday" => Weekday::Fri,
    "sat" | "saturday" => Weekday::Sat,
    "sun" | "sunday" => Weekday::Sun,
    _ => return None,
  };
  Some(day)
}

static TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?")
    .expect("time token regex is valid")
});

fn explicit_time(label: &str) -> Option<(u32, u32)> {
  for caps in TIME_TOKEN.captures_iter(label) {
    let Ok(hour) = caps[1].parse::<u32>() else { continue };
    let minute = match caps.get(2) {
      Some(m) => match m.as_str().parse::<u32>() {
        Ok(m) if m < 60 => m,
        _ => continue,
      },
      None => 0,
    };
    let meridiem = caps.get(3).map(|m| m.as_str().starts_with('p'));
    let hour = match meridiem {
      Some(pm) if (1..=12).contains(&hour) => match (pm, hour) {
        (true, 12) => 12,
        (true, h) => h + 12,
        (false, 12) => 0,
        (false, h) => h,
      },
      Some(_) => continue,
      None if hour < 24 => hour,
      None => continue,
    };
    return Some((hour, minute));
  }
  None
}

fn part_of_day(label: &str) -> Option<(u32, u32)> {
  if label.contains("morning") {
    Some((10, 0))
  } else if label.contains("noon") || label.contains("midday") {
    Some((12, 0))
  } else if label.contains("afternoon") {
    Some((14, 0))
  } else if label.contains("evening") || label.contains("night") {
    Some((17, 0))
  } else {
    None
  }
}

/// Split a label into weekday and time of day. Explicit times beat
/// part-of-day words; with neither, the time is 14:00.
pub fn parse_label(label: &str) -> ParsedLabel {
  let lower = label.to_lowercase();
  let weekday = lower
    .split(|c: char| !c.is_ascii_alphanumeric())
    .find_map(weekday_alias);
  let (hour, minute) = explicit_time(&lower)
    .or_else(|| part_of_day(&lower))
    .unwrap_or((DEFAULT_HOUR, 0));
  ParsedLabel { weekday, hour, minute }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// A concrete visit start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSlot {
  #[serde(skip)]
  pub start:     DateTime<Tz>,
  pub start_iso: String,
  /// e.g. "Wednesday, May 8 at 2:00 PM".
  pub when_text: String,
}

impl ResolvedSlot {
  fn new(start: DateTime<Tz>) -> Self {
    Self {
      start_iso: start.to_rfc3339(),
      when_text: when_text(&start),
      start,
    }
  }
}

pub fn when_text(dt: &DateTime<Tz>) -> String {
  dt.format("%A, %B %-d at %-I:%M %p").to_string()
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolves slots in one facility time zone.
#[derive(Debug, Clone, Copy)]
pub struct TimeResolver {
  tz: Tz,
}

impl TimeResolver {
  pub fn new(tz: Tz) -> Self { Self { tz } }

  /// Build from an IANA name such as `America/New_York`.
  pub fn from_name(name: &str) -> Result<Self> {
    Tz::from_str(name)
      .map(Self::new)
      .map_err(|_| Error::UnknownTimeZone(name.to_owned()))
  }

  pub fn tz(&self) -> Tz { self.tz }

  /// Resolve `input` relative to `now`.
  pub fn resolve(&self, input: &TimeInput, now: DateTime<Utc>) -> Result<ResolvedSlot> {
    let (candidate, weekday_named) = match input {
      TimeInput::Timestamp(ts) => (ts.with_timezone(&self.tz), false),
      TimeInput::Label(label) => {
        let parsed = parse_label(label);
        let today = now.with_timezone(&self.tz).date_naive();
        let date = match parsed.weekday {
          Some(day) => next_occurrence(today, day),
          None => today,
        };
        (self.at(date, parsed.hour, parsed.minute)?, parsed.weekday.is_some())
      }
    };

    let mut slot = self.clamp_to_business_window(candidate)?;
    let lead = TimeDelta::hours(LEAD_TIME_HOURS);
    while slot.with_timezone(&Utc) - now < lead {
      let next = if weekday_named {
        let date = add_days(slot.date_naive(), 7);
        self.at(date, slot.hour(), slot.minute())?
      } else {
        self.next_business_open(slot.date_naive())?
      };
      slot = self.clamp_to_business_window(next)?;
    }
    Ok(ResolvedSlot::new(slot))
  }

  /// Convenience for free text or RFC 3339 strings.
  pub fn resolve_str(&self, raw: &str, now: DateTime<Utc>) -> Result<ResolvedSlot> {
    self.resolve(&TimeInput::parse(raw), now)
  }

  /// Move `dt` into the business window. Weekends land on Monday at opening
  /// time; early starts move to opening time; late starts roll to the next
  /// business day's opening.
  pub fn clamp_to_business_window(&self, dt: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let date = dt.date_naive();
    match dt.weekday() {
      Weekday::Sat => return self.at(add_days(date, 2), OPEN_HOUR, 0),
      Weekday::Sun => return self.at(add_days(date, 1), OPEN_HOUR, 0),
      _ => {}
    }
    let past_close = dt.hour() > CLOSE_HOUR
      || (dt.hour() == CLOSE_HOUR && (dt.minute() > 0 || dt.second() > 0));
    if dt.hour() < OPEN_HOUR {
      self.at(date, OPEN_HOUR, 0)
    } else if past_close {
      self.next_business_open(date)
    } else {
      Ok(dt)
    }
  }

  /// Whether `dt` is already a valid business-window start.
  pub fn is_in_business_window(&self, dt: DateTime<Tz>) -> bool {
    matches!(self.clamp_to_business_window(dt), Ok(c) if c == dt)
  }

  fn next_business_open(&self, date: NaiveDate) -> Result<DateTime<Tz>> {
    let mut day = add_days(date, 1);
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
      day = add_days(day, 1);
    }
    self.at(day, OPEN_HOUR, 0)
  }

  fn at(&self, date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Tz>> {
    date
      .and_hms_opt(hour, minute, 0)
      .and_then(|naive| self.tz.from_local_datetime(&naive).earliest())
      .ok_or(Error::InvalidLocalTime { date, hour, minute })
  }
}

fn add_days(date: NaiveDate, n: u64) -> NaiveDate {
  date.checked_add_days(Days::new(n)).unwrap_or(NaiveDate::MAX)
}

/// The next `day` on or after `from`.
fn next_occurrence(from: NaiveDate, day: Weekday) -> NaiveDate {
  let ahead = (7 + day.num_days_from_monday() - from.weekday().num_days_from_monday()) % 7;
  add_days(from, u64::from(ahead))
}

#[cfg(test)]
mod tests {
  use chrono_tz::America::New_York;

  use super::*;

  fn resolver() -> TimeResolver { TimeResolver::new(New_York) }

  fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    New_York.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
  }

  fn utc(dt: DateTime<Tz>) -> DateTime<Utc> { dt.with_timezone(&Utc) }

  // 2024-05-06 is a Monday.

  #[test]
  fn wednesday_afternoon_from_monday_morning() {
    let now = local(2024, 5, 6, 9, 0);
    let slot = resolver()
      .resolve_str("Wednesday afternoon", utc(now))
      .unwrap();
    assert_eq!(slot.start, local(2024, 5, 8, 14, 0));
    assert_eq!(slot.start.weekday(), Weekday::Wed);
    assert!(slot.start.with_timezone(&Utc) - utc(now) >= TimeDelta::hours(48));
    assert_eq!(slot.when_text, "Wednesday, May 8 at 2:00 PM");
  }

  #[test]
  fn wednesday_under_lead_time_moves_a_week() {
    let now = local(2024, 5, 6, 15, 0);
    let slot = resolver()
      .resolve_str("Wednesday afternoon", utc(now))
      .unwrap();
    assert_eq!(slot.start, local(2024, 5, 15, 14, 0));
  }

  #[test]
  fn named_weekday_includes_today() {
    let now = local(2024, 5, 6, 9, 0);
    // Today at 14:00 is too soon, so the same slot next week.
    let slot = resolver().resolve_str("Monday afternoon", utc(now)).unwrap();
    assert_eq!(slot.start, local(2024, 5, 13, 14, 0));
  }

  #[test]
  fn short_aliases_and_meridiem() {
    let now = local(2024, 5, 6, 9, 0);
    let slot = resolver().resolve_str("Fri 10am", utc(now)).unwrap();
    assert_eq!(slot.start, local(2024, 5, 10, 10, 0));

    let slot = resolver().resolve_str("thurs at 3:30 pm", utc(now)).unwrap();
    assert_eq!(slot.start, local(2024, 5, 9, 15, 30));

    let slot = resolver().resolve_str("Wednesday 5pm", utc(now)).unwrap();
    assert_eq!(slot.start, local(2024, 5, 8, 17, 0));
  }

  #[test]
  fn bare_time_rolls_forward_to_business_open() {
    let now = local(2024, 5, 6, 9, 0);
    let slot = resolver().resolve_str("13:00", utc(now)).unwrap();
    // Today and tomorrow are inside 48h; Wednesday 10:00 is 49h away.
    assert_eq!(slot.start, local(2024, 5, 8, 10, 0));
  }

  #[test]
  fn weekend_label_lands_on_monday_opening() {
    let now = local(2024, 5, 6, 9, 0);
    let slot = resolver().resolve_str("Saturday morning", utc(now)).unwrap();
    assert_eq!(slot.start, local(2024, 5, 13, 10, 0));
  }

  #[test]
  fn explicit_timestamp_is_clamped() {
    let now = local(2024, 5, 6, 9, 0);
    let slot = resolver()
      .resolve_str("2024-05-09T19:30:00-04:00", utc(now))
      .unwrap();
    assert_eq!(slot.start, local(2024, 5, 10, 10, 0));
  }

  #[test]
  fn clamp_weekend_to_monday_ten() {
    let r = resolver();
    for dt in [local(2024, 5, 11, 14, 0), local(2024, 5, 12, 9, 0), local(2024, 5, 12, 18, 45)] {
      let clamped = r.clamp_to_business_window(dt).unwrap();
      assert_eq!(clamped.weekday(), Weekday::Mon);
      assert_eq!((clamped.hour(), clamped.minute()), (10, 0));
    }
  }

  #[test]
  fn clamp_after_close_to_next_weekday_ten() {
    let r = resolver();
    assert_eq!(
      r.clamp_to_business_window(local(2024, 5, 9, 17, 30)).unwrap(),
      local(2024, 5, 10, 10, 0)
    );
    assert_eq!(
      r.clamp_to_business_window(local(2024, 5, 10, 18, 0)).unwrap(),
      local(2024, 5, 13, 10, 0)
    );
    // 17:00 sharp is still bookable.
    let five = local(2024, 5, 9, 17, 0);
    assert_eq!(r.clamp_to_business_window(five).unwrap(), five);
  }

  #[test]
  fn clamp_early_start_to_opening() {
    let r = resolver();
    assert_eq!(
      r.clamp_to_business_window(local(2024, 5, 7, 8, 15)).unwrap(),
      local(2024, 5, 7, 10, 0)
    );
  }

  #[test]
  fn label_parsing_defaults() {
    assert_eq!(
      parse_label("sometime next week"),
      ParsedLabel { weekday: None, hour: 14, minute: 0 }
    );
    assert_eq!(parse_label("Tue evening").hour, 17);
    assert_eq!(parse_label("Tue evening").weekday, Some(Weekday::Tue));
    assert_eq!(parse_label("noon on weds").hour, 12);
    assert_eq!(parse_label("12am").hour, 0);
    // "sat" inside a longer word is not a weekday.
    assert_eq!(parse_label("satisfied either way").weekday, None);
  }

  #[test]
  fn unknown_time_zone_is_an_error() {
    assert!(matches!(
      TimeResolver::from_name("Mars/Olympus_Mons"),
      Err(Error::UnknownTimeZone(_))
    ));
  }
}
