//! Deterministic booking keys.
//!
//! The same person asking for the same slot in the same room always derives
//! the same key, so a retried request can never create a second event.

use sha2::{Digest, Sha256};

const SEPARATOR: u8 = 0x1f;

/// Inputs that identify one booking intent.
#[derive(Debug, Clone, Copy)]
pub struct KeyParts<'a> {
  pub room_id:  &'a str,
  pub agent_id: &'a str,
  pub email:    &'a str,
  /// The resolved start when known, otherwise the raw label.
  pub slot:     &'a str,
}

/// `visit-` followed by the SHA-256 hex digest of the parts.
pub fn booking_key(parts: KeyParts<'_>) -> String {
  let email = parts.email.trim().to_lowercase();
  let mut hasher = Sha256::new();
  for (i, part) in [parts.room_id, parts.agent_id, &email, parts.slot.trim()]
    .into_iter()
    .enumerate()
  {
    if i > 0 {
      hasher.update([SEPARATOR]);
    }
    hasher.update(part.as_bytes());
  }
  format!("visit-{}", hex::encode(hasher.finalize()))
}
