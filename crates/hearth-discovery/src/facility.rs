//! Static facility information: locations, services, pricing.
//!
//! The catalog is plain configuration. It is rendered into prompts as a
//! text blob and consulted directly for nearest-location and pricing
//! lookups.

use std::sync::LazyLock;

use hearth_core::record::ComprehensiveRecord;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
  pub name:         String,
  pub city:         String,
  /// Lowercase city and area names this location serves.
  #[serde(default)]
  pub service_area: Vec<String>,
  /// One sentence quoted when someone asks about cost.
  pub pricing:      String,
}

impl Location {
  fn serves(&self, haystack: &str) -> bool {
    haystack.contains(&self.city.to_lowercase())
      || self.service_area.iter().any(|a| haystack.contains(&a.to_lowercase()))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
  pub name:        String,
  pub description: String,
  /// Words in the family's answers that point at this service.
  #[serde(default)]
  pub keywords:    Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Facility {
  pub name:      String,
  pub locations: Vec<Location>,
  pub services:  Vec<Service>,
  pub amenities: Vec<String>,
  pub policies:  Vec<String>,
}

static PRICING: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)\b(prices?|pricing|costs?|how much|afford\w*|expensive|fees?|rates?|budget|monthly)\b|\$",
  )
  .expect("pricing regex is valid")
});

impl Facility {
  /// The location serving `user_location`, or the first location.
  pub fn nearest(&self, user_location: Option<&str>) -> Option<&Location> {
    let wanted = user_location.map(str::to_lowercase).unwrap_or_default();
    self
      .locations
      .iter()
      .find(|l| !wanted.is_empty() && l.serves(&wanted))
      .or_else(|| self.locations.first())
  }

  /// The pricing sentence for the location nearest `user_location`.
  pub fn pricing_for(&self, user_location: Option<&str>) -> Option<&str> {
    self.nearest(user_location).map(|l| l.pricing.as_str())
  }

  /// The service whose keywords best match the family's answers.
  pub fn matched_service(&self, record: &ComprehensiveRecord) -> Option<&Service> {
    let answers = record
      .all_entries()
      .map(|e| e.answer.to_lowercase())
      .collect::<Vec<_>>()
      .join(" ");
    let score = |s: &Service| s.keywords.iter().filter(|k| answers.contains(&k.to_lowercase())).count();

    let mut best: Option<(&Service, usize)> = None;
    for service in &self.services {
      let n = score(service);
      if best.is_none_or(|(_, top)| n > top) {
        best = Some((service, n));
      }
    }
    best.map(|(s, _)| s)
  }

  /// Everything a reply may quote, as prompt text. Pricing is left out;
  /// it is only handed to the model for explicit pricing questions.
  pub fn info_blob(&self) -> String {
    let mut out = format!("{}\n\nLocations:\n", self.name);
    for l in &self.locations {
      out.push_str(&format!("- {} ({})\n", l.name, l.city));
    }
    out.push_str("\nServices:\n");
    for s in &self.services {
      out.push_str(&format!("- {}: {}\n", s.name, s.description));
    }
    if !self.amenities.is_empty() {
      out.push_str(&format!("\nAmenities: {}\n", self.amenities.join(", ")));
    }
    if !self.policies.is_empty() {
      out.push_str("\nPolicies:\n");
      for p in &self.policies {
        out.push_str(&format!("- {p}\n"));
      }
    }
    out
  }
}

/// Whether `message` asks what something costs.
pub fn is_pricing_question(message: &str) -> bool {
  PRICING.is_match(message)
}

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| (*s).to_owned()).collect() }

impl Default for Facility {
  fn default() -> Self {
    Self {
      name:      "Hearthside Senior Living".to_owned(),
      locations: vec![
        Location {
          name:         "Hearthside Tampa Bay".to_owned(),
          city:         "Tampa".to_owned(),
          service_area: strings(&["tampa", "brandon", "clearwater", "st. petersburg", "st pete", "largo"]),
          pricing:      "At Hearthside Tampa Bay, assisted living starts at $4,800 per month and memory care at $6,200 per month.".to_owned(),
        },
        Location {
          name:         "Hearthside Orlando".to_owned(),
          city:         "Orlando".to_owned(),
          service_area: strings(&["orlando", "kissimmee", "winter park", "sanford"]),
          pricing:      "At Hearthside Orlando, assisted living starts at $4,500 per month and memory care at $5,900 per month.".to_owned(),
        },
        Location {
          name:         "Hearthside Sarasota".to_owned(),
          city:         "Sarasota".to_owned(),
          service_area: strings(&["sarasota", "bradenton", "venice", "lakewood ranch"]),
          pricing:      "At Hearthside Sarasota, assisted living starts at $5,100 per month and memory care at $6,500 per month.".to_owned(),
        },
      ],
      services:  vec![
        Service {
          name:        "Memory Care".to_owned(),
          description: "a secure neighborhood with staff trained in dementia care and daily structured activities".to_owned(),
          keywords:    strings(&["memory", "dementia", "alzheimer", "forget", "confused", "wander", "lost"]),
        },
        Service {
          name:        "Assisted Living".to_owned(),
          description: "private apartments with help for bathing, dressing and medications around the clock".to_owned(),
          keywords:    strings(&["fall", "help", "bathing", "medication", "mobility", "walker", "alone", "cook"]),
        },
        Service {
          name:        "Independent Living".to_owned(),
          description: "maintenance-free apartments with dining, transportation and a full social calendar".to_owned(),
          keywords:    strings(&["lonely", "social", "active", "friends", "downsize", "house", "drive"]),
        },
      ],
      amenities: strings(&[
        "chef-prepared meals",
        "fitness and wellness programs",
        "gardens and walking paths",
        "scheduled transportation",
        "salon and barber",
        "pet-friendly apartments",
      ]),
      policies:  strings(&[
        "Visitors are welcome every day from 9am to 8pm.",
        "Tours are available Monday to Friday, 10am to 5pm.",
        "Residents may bring their own furniture.",
      ]),
    }
  }
}

#[cfg(test)]
mod tests {
  use hearth_core::{Stage, record::QaEntry};

  use super::*;

  #[test]
  fn nearest_matches_service_area() {
    let f = Facility::default();
    assert_eq!(f.nearest(Some("Brandon, FL")).unwrap().city, "Tampa");
    assert_eq!(f.nearest(Some("winter park")).unwrap().city, "Orlando");
    // Unknown and missing locations fall back to the first.
    assert_eq!(f.nearest(Some("Boise")).unwrap().city, "Tampa");
    assert_eq!(f.nearest(None).unwrap().city, "Tampa");
  }

  #[test]
  fn pricing_questions() {
    assert!(is_pricing_question("How much does it cost?"));
    assert!(is_pricing_question("What's the monthly PRICE"));
    assert!(!is_pricing_question("Do you allow pets?"));
    assert!(!is_pricing_question("I feel separated from her"));
  }

  #[test]
  fn service_matching_uses_answers() {
    let f = Facility::default();
    let mut record = ComprehensiveRecord::default();
    record
      .push_entry(QaEntry::new(
        Stage::SituationDiscovery,
        "What is your biggest concern about your loved one right now?",
        "She keeps getting confused and forgets her stove is on",
      ))
      .unwrap();
    assert_eq!(f.matched_service(&record).unwrap().name, "Memory Care");
  }

  #[test]
  fn blob_leaves_out_pricing() {
    let blob = Facility::default().info_blob();
    assert!(blob.contains("Memory Care"));
    assert!(!blob.contains('$'));
  }
}
