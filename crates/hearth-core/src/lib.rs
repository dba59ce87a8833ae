//! Core types and trait definitions for Hearth discovery conversations.
//!
//! This crate is free of HTTP, model and database dependencies. It defines
//! the conversation's data model and the seams (store, text generation,
//! booking, record export) the other crates plug into.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod booking;
pub mod error;
pub mod export;
pub mod generate;
pub mod record;
pub mod session;
pub mod stage;
pub mod store;
pub mod visit;

pub use error::{Error, Result};
pub use stage::Stage;
