//! Turning "Wednesday afternoon" into a booked visit.
//!
//! - [`time`] resolves labels and timestamps into business-hours instants.
//! - [`idempotency`] derives the deterministic booking key.
//! - [`client`] posts bookings to a scheduling provider.
//! - [`calendar`] is an in-process provider implementing the same contract.

pub mod calendar;
pub mod client;
pub mod error;
pub mod idempotency;
pub mod time;
pub mod wire;

pub use client::{BookingClient, BookingConfig};
pub use error::{Error, Result};
pub use time::{ResolvedSlot, TimeInput, TimeResolver};
