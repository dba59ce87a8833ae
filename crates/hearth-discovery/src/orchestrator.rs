//! [`Orchestrator`] — the stage state machine.
//!
//! One call to [`Orchestrator::handle_message`] is one conversational turn:
//! record the message, work out which stage the user is in, let that stage's
//! handler answer, and persist the reply. A stage that completes hands the
//! same message to the next stage's handler within the same turn.

use std::{fmt, sync::Arc, time::Duration};

use hearth_core::{
  Stage,
  booking::VisitBooker,
  export::RecordExporter,
  generate::TextGenerator,
  record::{QaEntry, RecordUpdate},
  session::{ChatMessage, Reply, ReplyMetadata, ResponseStatus, UserSession},
  store::SessionStore,
  visit::{VisitStep, visit_step},
};
use hearth_schedule::TimeResolver;
use serde::Deserialize;

use crate::{
  Result,
  classify::{ClassifyInput, classify},
  extract::extract_contact,
  facility::{Facility, is_pricing_question},
  locks::KeyedLocks,
  model::Model,
  respond::{self, QuestionTurn, question_fallback, should_use_name},
};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
  /// Chance that a generated reply addresses the user by name.
  pub name_probability:     f64,
  pub llm_timeout_secs:     u64,
  pub booking_timeout_secs: u64,
  /// Upper bound on a whole turn before the fallback reply is sent.
  pub turn_timeout_secs:    u64,
  /// The slot offered once the user agrees to visit.
  pub proposed_visit:       String,
  /// IANA zone visits are scheduled in.
  pub time_zone:            String,
}

impl Default for DiscoveryConfig {
  fn default() -> Self {
    Self {
      name_probability:     0.5,
      llm_timeout_secs:     20,
      booking_timeout_secs: 15,
      turn_timeout_secs:    60,
      proposed_visit:       "Wednesday 5pm".to_owned(),
      time_zone:            "America/New_York".to_owned(),
    }
  }
}

// ─── Fallback text ───────────────────────────────────────────────────────────

const GENERIC_FALLBACK: &str =
  "Thank you for your patience. Could you tell me a little more about what you're looking for?";

fn stage_fallback(stage: Stage) -> &'static str {
  match stage {
    Stage::TrustBuilding => {
      "Thank you for reaching out. Could you share your name, where you're located and your loved one's name?"
    }
    Stage::SituationDiscovery => "I'd love to hear a bit more about what's going on with your loved one.",
    Stage::LifestyleDiscovery => "Tell me a little about what your loved one enjoys day to day.",
    Stage::ReadinessDiscovery => "How is your loved one feeling about the idea of a move?",
    Stage::PrioritiesDiscovery => "What matters most to you as you look at communities?",
    Stage::NeedsMatching => {
      "Based on what you've shared, I think our community could be a wonderful fit. Would you like to hear more?"
    }
    Stage::ScheduleVisit => "Our team will follow up by email to help with your visit.",
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// What a stage handler decided.
pub(crate) enum Step {
  Reply(Reply),
  /// The stage is complete. The optional lead-in prefixes the next stage's
  /// reply.
  Advance(Option<String>),
}

pub(crate) fn reply(stage: Stage, text: String, response_status: ResponseStatus) -> Reply {
  Reply { text, metadata: ReplyMetadata { stage, response_status } }
}

pub struct Orchestrator<S, G, B, E> {
  pub(crate) store:    S,
  pub(crate) model:    Model<G>,
  pub(crate) booker:   B,
  pub(crate) exporter: Arc<E>,
  pub(crate) facility: Facility,
  pub(crate) resolver: TimeResolver,
  pub(crate) config:   DiscoveryConfig,
  locks:               KeyedLocks,
}

impl<S, G, B, E> Orchestrator<S, G, B, E>
where
  S: SessionStore,
  G: TextGenerator,
  B: VisitBooker,
  E: RecordExporter + 'static,
{
  pub fn new(
    store: S,
    generator: G,
    booker: B,
    exporter: E,
    facility: Facility,
    config: DiscoveryConfig,
  ) -> Result<Self> {
    let resolver = TimeResolver::from_name(&config.time_zone)?;
    let model = Model::new(generator, Duration::from_secs(config.llm_timeout_secs));
    Ok(Self {
      store,
      model,
      booker,
      exporter: Arc::new(exporter),
      facility,
      resolver,
      config,
      locks: KeyedLocks::default(),
    })
  }

  pub fn store(&self) -> &S { &self.store }

  /// Run one turn for `user_id`. Never fails: a turn that overruns its
  /// deadline becomes a fallback reply. Turns for the same user run one at a
  /// time.
  pub async fn handle_message(&self, user_id: &str, text: &str) -> Reply {
    let _turn = self.locks.lock(user_id).await;

    let recorded = self.store.append_message(user_id, ChatMessage::user(text)).await;
    logged(user_id, "record user message", recorded);

    let deadline = Duration::from_secs(self.config.turn_timeout_secs);
    let reply = match tokio::time::timeout(deadline, self.run_turn(user_id, text)).await {
      Ok(reply) => reply,
      Err(_) => {
        tracing::warn!(user_id, "turn timed out, replying with fallback");
        self.fallback_reply(user_id).await
      }
    };

    let recorded = self.store.append_message(user_id, ChatMessage::agent(&reply)).await;
    logged(user_id, "record agent reply", recorded);
    reply
  }

  /// The stored session, or an empty one when the store cannot be read.
  pub(crate) async fn load_session(&self, user_id: &str) -> UserSession {
    let loaded = self.store.get_or_create(user_id).await;
    logged(user_id, "load session", loaded).unwrap_or_else(|| UserSession::new(user_id))
  }

  async fn run_turn(&self, user_id: &str, text: &str) -> Reply {
    let session = self.load_session(user_id).await;
    let last = self.store.last_agent_metadata(user_id).await;
    let last = logged(user_id, "load reply metadata", last).flatten();

    let mut stored = session.state.current_stage;
    let mut stage = last.map_or(stored, |m| m.stage);
    if stage > stored {
      let advanced = self.store.advance_stage(user_id, stage).await;
      logged(user_id, "sync stage", advanced);
      stored = stage;
    }

    let mut entering = false;
    let mut lead_in = None;
    let reply = loop {
      let step = match stage {
        Stage::TrustBuilding => self.trust_building(user_id, text, &session).await,
        Stage::NeedsMatching => {
          let pitched = !entering && last.map(|m| m.stage) == Some(Stage::NeedsMatching);
          self.needs_matching(user_id, pitched).await
        }
        Stage::ScheduleVisit => Step::Reply(self.schedule_visit(user_id, text, entering).await),
        questioning => self.discovery(user_id, questioning, text, entering).await,
      };

      match step {
        Step::Reply(reply) => break reply,
        Step::Advance(lead) => {
          let next = stage.next().unwrap_or(Stage::ScheduleVisit);
          if next > stored {
            let advanced = self.store.advance_stage(user_id, next).await;
            logged(user_id, "advance stage", advanced);
            stored = next;
          }
          tracing::info!(user_id, from = %stage, to = %next, "stage advanced");
          lead_in = lead.or(lead_in);
          stage = next;
          entering = true;
        }
      }
    };

    match lead_in {
      Some(lead) => Reply { text: format!("{lead} {}", reply.text), ..reply },
      None => reply,
    }
  }

  // ── Stage handlers ──────────────────────────────────────────────────────

  async fn trust_building(&self, user_id: &str, text: &str, session: &UserSession) -> Step {
    let mut contact = session.record.contact_info.clone();
    let found = extract_contact(&self.model, text, &contact).await;

    if found.collected_at.is_some() {
      let saved = self.store.update_record(user_id, RecordUpdate::contact(found.clone())).await;
      match logged(user_id, "save contact info", saved) {
        Some(record) => contact = record.contact_info,
        None => {
          contact.merge(found);
        }
      }
    }

    if contact.is_complete() {
      let lead = contact.name.as_deref().map(|name| format!("Thank you, {name}."));
      return Step::Advance(lead);
    }

    let missing = contact.missing();
    let text = respond::contact_request(&self.model, text, &contact, &missing).await;
    Step::Reply(reply(Stage::TrustBuilding, text, ResponseStatus::Normal))
  }

  async fn discovery(&self, user_id: &str, stage: Stage, text: &str, entering: bool) -> Step {
    let mut session = self.load_session(user_id).await;
    let mut answered_now = None;
    if !entering && !text.trim().is_empty() {
      let next = stage.remaining_questions(session.record.answered(stage)).first().copied();
      if let Some(question) = next {
        let saved = self.store.add_qa_entry(user_id, stage, question, text.trim()).await;
        logged(user_id, "save answer", saved);
        // Keep this turn consistent even when the write was lost.
        let _ = session.record.push_entry(QaEntry::new(stage, question, text.trim()));
        answered_now = Some(question);
      }
    }

    let record = &session.record;
    let remaining = stage.remaining_questions(record.answered(stage));
    let Some(question) = remaining.first().copied() else {
      return Step::Advance(None);
    };

    let status = classify(&self.model, ClassifyInput {
      stage,
      question: answered_now,
      message: text,
    })
    .await;

    let prior_answers = stage
      .section()
      .map(|s| record.section(s).iter().map(|e| (e.question.as_str(), e.answer.as_str())).collect())
      .unwrap_or_default();
    let turn = QuestionTurn {
      stage,
      question,
      message: text,
      contact: &record.contact_info,
      prior_answers,
      use_name: should_use_name(self.config.name_probability),
    };

    let text = match status {
      ResponseStatus::Unexpected => {
        let pricing = is_pricing_question(text)
          .then(|| self.facility.pricing_for(record.contact_info.location.as_deref()))
          .flatten();
        respond::digression_reply(&self.model, &turn, &self.facility, pricing).await
      }
      _ => respond::scripted_reply(&self.model, &turn).await,
    };
    Step::Reply(reply(stage, text, status))
  }

  /// Deliver the pitch once; any reply to it moves on to scheduling.
  async fn needs_matching(&self, user_id: &str, pitched: bool) -> Step {
    if pitched {
      return Step::Advance(None);
    }
    let session = self.load_session(user_id).await;
    let use_name = should_use_name(self.config.name_probability);
    let text = respond::needs_matching_pitch(&self.model, &session.record, &self.facility, use_name).await;
    Step::Reply(reply(Stage::NeedsMatching, text, ResponseStatus::Normal))
  }

  // ── Fallback ────────────────────────────────────────────────────────────

  /// Three layers: the stage's next question by name, then a fixed sentence
  /// for the stage, then a generic sentence. The stage is the furthest one
  /// either source has reached.
  async fn fallback_reply(&self, user_id: &str) -> Reply {
    let session = self.store.get(user_id).await.ok().flatten();
    let last = self.store.last_agent_metadata(user_id).await.ok().flatten();
    let stage = fallback_stage(last.map(|m| m.stage), session.as_ref().map(|s| s.state.current_stage));

    let text = session
      .as_ref()
      .zip(stage)
      .and_then(|(session, stage)| next_question_fallback(session, stage))
      .or_else(|| stage.map(|s| stage_fallback(s).to_owned()))
      .unwrap_or_else(|| GENERIC_FALLBACK.to_owned());

    reply(stage.unwrap_or_default(), text, ResponseStatus::Fallback)
  }
}

/// Log a failed store call and carry on without its result.
pub(crate) fn logged<T, E: fmt::Display>(user_id: &str, action: &str, result: Result<T, E>) -> Option<T> {
  match result {
    Ok(value) => Some(value),
    Err(e) => {
      tracing::warn!(user_id, "could not {action}, continuing: {e}");
      None
    }
  }
}

fn fallback_stage(last: Option<Stage>, stored: Option<Stage>) -> Option<Stage> {
  match (last, stored) {
    (Some(a), Some(b)) => Some(a.max(b)),
    (a, b) => a.or(b),
  }
}

fn next_question_fallback(session: &UserSession, stage: Stage) -> Option<String> {
  let record = &session.record;
  let name = record.contact_info.name.as_deref();
  if stage == Stage::ScheduleVisit {
    let question = match visit_step(&record.visit_scheduling) {
      VisitStep::Agreement => "would you like to come visit us in person?",
      VisitStep::TimeConfirmation => "what day and time would work best for your visit?",
      VisitStep::EmailCollection => "what's the best email address for your visit confirmation?",
      VisitStep::ReferralSource => "how did you hear about us?",
      VisitStep::Close => return None,
    };
    return name.map(|n| format!("{n}, {question}"));
  }
  let remaining = stage.remaining_questions(record.answered(stage));
  remaining.first().map(|q| question_fallback(name, q))
}
