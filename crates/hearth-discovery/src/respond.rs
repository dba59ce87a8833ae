//! Reply generation.
//!
//! Every reply kind has a prompt and a hardcoded fallback, so a failed or
//! timed-out model call still produces something sensible to say.

use hearth_core::{
  Stage,
  generate::{CompletionRequest, Purpose, TextGenerator},
  record::{ComprehensiveRecord, ContactField, ContactInfo},
};
use rand::Rng;

use crate::{facility::Facility, model::Model};

const VOICE: &str = "\
You are a warm, patient senior living advisor talking with a family member \
who is looking for care for a loved one. Speak plainly, never pushy, never \
clinical. Reply with the message text only.";

/// Whether this reply should address the person by name. A NaN probability
/// counts as zero.
pub fn should_use_name(probability: f64) -> bool {
  let p = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
  rand::thread_rng().gen_bool(p)
}

/// `"{name}, {question}"`, or the bare question without a name.
pub fn question_fallback(name: Option<&str>, question: &str) -> String {
  match name {
    Some(name) => format!("{name}, {question}"),
    None => question.to_owned(),
  }
}

fn name_line(name: Option<&str>, use_name: bool) -> String {
  match name {
    Some(n) if use_name => format!("Address them as {n} once."),
    _ => "Do not use their name.".to_owned(),
  }
}

fn contact_line(contact: &ContactInfo) -> String {
  format!(
    "Family member: {}. Loved one: {}. Lives in: {}.",
    contact.name.as_deref().unwrap_or("unknown"),
    contact.loved_one_name.as_deref().unwrap_or("unknown"),
    contact.location.as_deref().unwrap_or("unknown"),
  )
}

// ─── Scripted questions ──────────────────────────────────────────────────────

/// Context for a reply that leads into a required question.
#[derive(Debug, Clone)]
pub struct QuestionTurn<'a> {
  pub stage:         Stage,
  pub question:      &'a str,
  pub message:       &'a str,
  pub contact:       &'a ContactInfo,
  pub prior_answers: Vec<(&'a str, &'a str)>,
  pub use_name:      bool,
}

impl QuestionTurn<'_> {
  fn name(&self) -> Option<&str> { self.contact.name.as_deref() }

  fn context(&self) -> String {
    let mut out = format!("{}\nStage: {}\n", contact_line(self.contact), self.stage);
    if !self.prior_answers.is_empty() {
      out.push_str("What they have told you so far:\n");
      for (q, a) in &self.prior_answers {
        out.push_str(&format!("- {q} {a}\n"));
      }
    }
    out
  }
}

/// A short acknowledgement followed by the next required question.
pub async fn scripted_reply<G: TextGenerator>(model: &Model<G>, turn: &QuestionTurn<'_>) -> String {
  let system = format!(
    "{VOICE}\nAcknowledge their last message in a few words, then ask the next \
     question in your own words. At most 40 words. {}",
    name_line(turn.name(), turn.use_name)
  );
  let user = format!(
    "{}\nTheir last message: {}\nNext question: {}",
    turn.context(),
    if turn.message.trim().is_empty() { "(none)" } else { turn.message.trim() },
    turn.question,
  );
  model
    .text_or(CompletionRequest::new(Purpose::ScriptedReply, system, user), || {
      question_fallback(turn.name(), turn.question)
    })
    .await
}

/// Answer an off-script message from the facility information, then come back
/// to the pending question. `pricing` is only set for pricing questions.
pub async fn digression_reply<G: TextGenerator>(
  model: &Model<G>,
  turn: &QuestionTurn<'_>,
  facility: &Facility,
  pricing: Option<&str>,
) -> String {
  let pricing_rule = match pricing {
    Some(p) => format!("They asked about cost. Quote exactly this: {p}"),
    None => "Do not mention prices.".to_owned(),
  };
  let system = format!(
    "{VOICE}\nThe family member went off script. Answer them briefly and \
     honestly using only the facility information below, then gently return \
     to the pending question. At most 70 words. {pricing_rule} {}\n\n\
     Facility information:\n{}",
    name_line(turn.name(), turn.use_name),
    facility.info_blob(),
  );
  let user = format!(
    "{}\nTheir message: {}\nPending question: {}",
    turn.context(),
    turn.message.trim(),
    turn.question,
  );
  model
    .text_or(CompletionRequest::new(Purpose::DigressionReply, system, user), || {
      let back = question_fallback(turn.name(), turn.question);
      match pricing {
        Some(p) => format!("{p} {back}"),
        None => back,
      }
    })
    .await
}

// ─── Trust building ──────────────────────────────────────────────────────────

fn join_fields(missing: &[ContactField]) -> String {
  let parts: Vec<&str> = missing.iter().map(|f| f.describe()).collect();
  match parts.as_slice() {
    [] => String::new(),
    [one] => (*one).to_owned(),
    [init @ .., last] => format!("{} and {last}", init.join(", ")),
  }
}

/// Ask for the contact details still missing.
pub async fn contact_request<G: TextGenerator>(
  model: &Model<G>,
  message: &str,
  contact: &ContactInfo,
  missing: &[ContactField],
) -> String {
  let wanted = join_fields(missing);
  let system = format!(
    "{VOICE}\nYou are opening the conversation. Welcome them warmly and ask for \
     {wanted}. At most 45 words."
  );
  let user = format!("{}\nTheir message: {}", contact_line(contact), message.trim());
  model
    .text_or(CompletionRequest::new(Purpose::ContactRequest, system, user), || {
      format!(
        "Thank you for reaching out. I'd love to help. To get started, could you share {wanted}?"
      )
    })
    .await
}

// ─── Needs matching ──────────────────────────────────────────────────────────

/// One persuasive message tying what the family shared to a matched service
/// at the nearest location.
pub async fn needs_matching_pitch<G: TextGenerator>(
  model: &Model<G>,
  record: &ComprehensiveRecord,
  facility: &Facility,
  use_name: bool,
) -> String {
  let contact = &record.contact_info;
  let service = facility.matched_service(record);
  let location = facility.nearest(contact.location.as_deref());
  let service_name = service.map_or("our community", |s| s.name.as_str());
  let location_name = location.map_or(facility.name.as_str(), |l| l.name.as_str());

  let mut answers = String::new();
  for e in record.all_entries() {
    answers.push_str(&format!("- {} {}\n", e.question, e.answer));
  }
  let system = format!(
    "{VOICE}\nWrite one message that connects the specific things they told \
     you to how {service_name} at {location_name} would help. Mention two or \
     three of their own details. At most 90 words. {}\n\nFacility \
     information:\n{}",
    name_line(contact.name.as_deref(), use_name),
    facility.info_blob(),
  );
  let user = format!("{}\nTheir answers:\n{answers}", contact_line(contact));

  model
    .text_or(CompletionRequest::new(Purpose::NeedsMatching, system, user), || {
      let loved_one = contact.loved_one_name.as_deref().unwrap_or("your loved one");
      format!(
        "Thank you for sharing so much. From everything you've told me, I think \
         {service_name} at {location_name} could be a wonderful fit for {loved_one}."
      )
    })
    .await
}

// ─── Visit scheduling ────────────────────────────────────────────────────────

/// Invite them to visit in person.
pub async fn visit_invitation<G: TextGenerator>(
  model: &Model<G>,
  record: &ComprehensiveRecord,
  facility: &Facility,
  message: &str,
) -> String {
  let contact = &record.contact_info;
  let location = facility
    .nearest(contact.location.as_deref())
    .map_or(facility.name.as_str(), |l| l.name.as_str());
  let system = format!(
    "{VOICE}\nRespond briefly to their message, then invite them to visit \
     {location} in person and ask whether they would like to. At most 45 words."
  );
  let user = format!("{}\nTheir message: {}", contact_line(contact), message.trim());
  model
    .text_or(CompletionRequest::new(Purpose::VisitInvitation, system, user), || {
      format!(
        "The best way to get a feel for {location} is to see it in person. Would you like to come for a visit?"
      )
    })
    .await
}

/// Reassure someone who hesitated, without pressure.
pub async fn encouragement<G: TextGenerator>(
  model: &Model<G>,
  contact: &ContactInfo,
  message: &str,
  follow_up: &str,
) -> String {
  let system = format!(
    "{VOICE}\nThey are hesitant. Acknowledge their feelings, offer one gentle \
     reason a visit helps, and end with this question in your own words: \
     {follow_up} At most 50 words."
  );
  let user = format!("{}\nTheir message: {}", contact_line(contact), message.trim());
  model
    .text_or(CompletionRequest::new(Purpose::Encouragement, system, user), || {
      format!(
        "I completely understand. Many families feel more at ease once they see the place for themselves. {follow_up}"
      )
    })
    .await
}

/// Thank them and confirm the visit time.
pub async fn closing<G: TextGenerator>(model: &Model<G>, contact: &ContactInfo, when: &str) -> String {
  let system = format!(
    "{VOICE}\nThey have booked a visit for {when}. Thank them for their time \
     and confirm the visit time. At most 40 words."
  );
  model
    .text_or(CompletionRequest::new(Purpose::Closing, system, contact_line(contact)), || {
      match contact.name.as_deref() {
        Some(name) => format!("Thank you, {name}! We look forward to seeing you on {when}."),
        None => format!("Thank you! We look forward to seeing you on {when}."),
      }
    })
    .await
}

/// Free-form help after everything is booked.
pub async fn support<G: TextGenerator>(
  model: &Model<G>,
  contact: &ContactInfo,
  facility: &Facility,
  when: Option<&str>,
  message: &str,
) -> String {
  let visit = when.map_or_else(|| "Their visit is being confirmed by email.".to_owned(), |w| {
    format!("Their visit is booked for {w}.")
  });
  let system = format!(
    "{VOICE}\n{visit} Answer their message kindly using only the facility \
     information below. At most 60 words.\n\nFacility information:\n{}",
    facility.info_blob(),
  );
  let user = format!("{}\nTheir message: {}", contact_line(contact), message.trim());
  model
    .text_or(CompletionRequest::new(Purpose::Support, system, user), || {
      "I'm here if you have any other questions. We look forward to your visit!".to_owned()
    })
    .await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fallback_question_uses_name_when_known() {
    let q = "What made you decide to reach out today?";
    assert_eq!(question_fallback(Some("John"), q), format!("John, {q}"));
    assert_eq!(question_fallback(None, q), q);
  }

  #[test]
  fn missing_fields_read_naturally() {
    let all = [ContactField::Name, ContactField::Location, ContactField::LovedOneName];
    let joined = join_fields(&all);
    assert!(joined.contains(", ") && joined.contains(" and "));
    assert_eq!(join_fields(&all[..1]), ContactField::Name.describe());
  }

  #[test]
  fn name_probability_extremes() {
    assert!(should_use_name(1.0));
    assert!(!should_use_name(0.0));
    assert!(!should_use_name(-3.0));
    assert!(should_use_name(7.5));
    assert!(!should_use_name(f64::NAN));
  }
}
