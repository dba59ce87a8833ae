//! The `schedule_visit` stage: agreement, time, email and booking, referral
//! source, then open-ended support.

use chrono::Utc;
use hearth_core::{
  Stage,
  booking::{BookingFailure, BookingResult, VisitBooker, VisitRequest},
  export::RecordExporter,
  generate::TextGenerator,
  record::{ContactInfo, RecordUpdate},
  session::{BookedVisit, Reply, ResponseStatus, UserSession},
  store::SessionStore,
  visit::{
    EMAIL_COLLECTION, REFERRAL_SOURCE, TIME_CONFIRMATION, VISIT_AGREEMENT, VisitStep,
    visit_step,
  },
};

use crate::{
  Orchestrator,
  extract::{detect_agreement, detect_time_confirmation, extract_email},
  orchestrator::{logged, reply},
  respond,
};

const ASK_EMAIL_AGAIN: &str =
  "I didn't quite catch that. What's the best email address to send your visit confirmation to?";

impl<S, G, B, E> Orchestrator<S, G, B, E>
where
  S: SessionStore,
  G: TextGenerator,
  B: VisitBooker,
  E: RecordExporter + 'static,
{
  pub(crate) async fn schedule_visit(&self, user_id: &str, text: &str, entering: bool) -> Reply {
    let session = self.load_session(user_id).await;
    let record = &session.record;
    let contact = &record.contact_info;
    let step = visit_step(&record.visit_scheduling);
    let proposed = self.config.proposed_visit.as_str();
    tracing::debug!(user_id, step = step.number(), entering, "visit scheduling turn");

    let text = match step {
      VisitStep::Agreement if entering => {
        respond::visit_invitation(&self.model, record, &self.facility, text).await
      }
      VisitStep::Agreement => {
        let decision = detect_agreement(&self.model, text).await;
        if decision.agreed {
          self.mark(user_id, VISIT_AGREEMENT, text).await;
          format!("Wonderful! How does {proposed} sound for your visit?")
        } else {
          let follow_up = "Would you be open to a short visit whenever you feel ready?";
          respond::encouragement(&self.model, contact, text, follow_up).await
        }
      }
      VisitStep::TimeConfirmation => {
        let decision = detect_time_confirmation(&self.model, proposed, text).await;
        if decision.confirmed {
          self.mark(user_id, TIME_CONFIRMATION, proposed).await;
          ask_email(proposed)
        } else if let Some(alternative) = decision.alternative() {
          self.mark(user_id, TIME_CONFIRMATION, alternative).await;
          ask_email(alternative)
        } else if decision.rejected {
          let follow_up = "Is there another day and time that might work better for you?";
          respond::encouragement(&self.model, contact, text, follow_up).await
        } else {
          format!("Does {proposed} work for you, or is there another day and time that suits you better?")
        }
      }
      VisitStep::EmailCollection => self.collect_email(user_id, &session, text).await,
      VisitStep::ReferralSource => {
        self.mark(user_id, REFERRAL_SOURCE, text).await;
        let when = session
          .state
          .booking
          .as_ref()
          .map(|b| b.when_text.clone())
          .or_else(|| session.state.requested_slot.clone())
          .or_else(|| record.answer_to(Stage::ScheduleVisit, TIME_CONFIRMATION).map(str::to_owned))
          .unwrap_or_else(|| proposed.to_owned());
        respond::closing(&self.model, contact, &when).await
      }
      VisitStep::Close => {
        let when = session.state.booking.as_ref().map(|b| b.when_text.as_str());
        respond::support(&self.model, contact, &self.facility, when, text).await
      }
    };
    reply(Stage::ScheduleVisit, text, ResponseStatus::Normal)
  }

  async fn mark(&self, user_id: &str, marker: &str, answer: &str) {
    let saved = self
      .store
      .add_qa_entry(user_id, Stage::ScheduleVisit, marker, answer.trim())
      .await;
    logged(user_id, "save visit step", saved);
  }

  async fn collect_email(&self, user_id: &str, session: &UserSession, text: &str) -> String {
    let record = &session.record;
    let slot = record
      .answer_to(Stage::ScheduleVisit, TIME_CONFIRMATION)
      .unwrap_or(self.config.proposed_visit.as_str());

    if session.state.reschedule_pending
      && let Some(email) = record.contact_info.email.as_deref()
    {
      let label = text.trim();
      if label.is_empty() {
        return "What other day and time would work for your visit?".to_owned();
      }
      return self.book(user_id, email, label, true).await;
    }

    let Some(email) = extract_email(&self.model, text).await else {
      return ASK_EMAIL_AGAIN.to_owned();
    };
    tracing::info!(user_id, "email collected");
    let saved = self
      .store
      .update_record(
        user_id,
        RecordUpdate::contact(ContactInfo { email: Some(email.clone()), ..ContactInfo::default() }),
      )
      .await;
    logged(user_id, "save email", saved);
    self.book(user_id, &email, slot, session.state.reschedule_pending).await
  }

  /// Book `label` for `email` and phrase the outcome. Only a conflict keeps
  /// the conversation on the email step.
  async fn book(&self, user_id: &str, email: &str, label: &str, rescheduling: bool) -> String {
    if rescheduling {
      let saved = self.store.set_requested_slot(user_id, label).await;
      logged(user_id, "save requested slot", saved);
    }

    let start_iso = match self.resolver.resolve_str(label, Utc::now()) {
      Ok(slot) => Some(slot.start_iso),
      Err(e) => {
        tracing::warn!(user_id, label, "could not resolve visit time: {e}");
        None
      }
    };
    let request = VisitRequest {
      email: email.to_owned(),
      label: Some(label.to_owned()),
      start_iso,
    };

    let timeout = std::time::Duration::from_secs(self.config.booking_timeout_secs);
    let result = tokio::time::timeout(timeout, self.booker.book(request))
      .await
      .unwrap_or_else(|_| {
        tracing::warn!(user_id, "booking timed out");
        BookingResult::Failed(BookingFailure::network_error())
      });

    match result {
      BookingResult::Booked(booked) => {
        let when = booked.when_text.clone();
        let saved = self
          .store
          .record_booking(user_id, BookedVisit {
            event_id:  booked.event_id,
            html_link: booked.html_link,
            start_iso: booked.start_iso,
            when_text: booked.when_text,
          })
          .await;
        logged(user_id, "save booking", saved);
        self.finish_email_step(user_id, email).await;
        format!(
          "You're all set! Your visit is booked for {when}, and the details are on their way to {email}. One last question: how did you hear about us?"
        )
      }
      BookingResult::Failed(failure) if failure.is_conflict() => {
        let saved = self.store.set_reschedule_pending(user_id, true).await;
        logged(user_id, "flag reschedule", saved);
        format!("It looks like {label} was just taken. What other day and time would work for you?")
      }
      BookingResult::Failed(failure) => {
        tracing::warn!(user_id, error = %failure.error, "booking failed, continuing");
        if rescheduling {
          let saved = self.store.set_reschedule_pending(user_id, false).await;
          logged(user_id, "clear reschedule", saved);
        }
        self.finish_email_step(user_id, email).await;
        "Thank you! Our team will confirm your visit time by email shortly. In the meantime, how did you hear about us?"
          .to_owned()
      }
    }
  }

  /// Persist the email marker and hand the record off for follow-up.
  async fn finish_email_step(&self, user_id: &str, email: &str) {
    self.mark(user_id, EMAIL_COLLECTION, email).await;
    let loaded = self.store.get_or_create(user_id).await;
    let Some(session) = logged(user_id, "load record for export", loaded) else {
      return;
    };

    let exporter = self.exporter.clone();
    let email = email.to_owned();
    let record = session.record;
    tokio::spawn(async move {
      if let Err(e) = exporter.export(email, record).await {
        tracing::warn!("record export failed: {e}");
      }
    });
  }
}

fn ask_email(slot: &str) -> String {
  format!("Perfect, {slot} it is. What's the best email address to send your visit confirmation to?")
}
