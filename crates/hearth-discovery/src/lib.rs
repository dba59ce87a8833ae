//! The discovery conversation: stage orchestration, classification, fact
//! extraction, reply generation and visit scheduling.
//!
//! Everything here talks to the outside world through the seams defined in
//! `hearth-core` ([`SessionStore`](hearth_core::store::SessionStore),
//! [`TextGenerator`](hearth_core::generate::TextGenerator),
//! [`VisitBooker`](hearth_core::booking::VisitBooker) and
//! [`RecordExporter`](hearth_core::export::RecordExporter)).

#![allow(async_fn_in_trait)]

pub mod classify;
pub mod error;
pub mod export;
pub mod extract;
pub mod facility;
pub mod json;
pub mod llm;
mod locks;
pub mod model;
pub mod orchestrator;
pub mod respond;
mod visit;


pub use error::{Error, Result};
pub use facility::Facility;
pub use orchestrator::{DiscoveryConfig, Orchestrator};
