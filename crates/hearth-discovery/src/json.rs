//! Pulling a JSON object out of model output.
//!
//! Models wrap JSON in code fences or surround it with chatter often enough
//! that a plain `serde_json::from_str` is not sufficient.

use serde::de::DeserializeOwned;

/// The first JSON object in `raw`: a fenced ```` ```json ```` block when
/// present, otherwise the span from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<&str> {
  for fence in ["```json", "```JSON", "```"] {
    if let Some(start) = raw.find(fence)
      && let Some(len) = raw[start + fence.len()..].find("```")
    {
      let inner = raw[start + fence.len()..start + fence.len() + len].trim();
      if inner.starts_with('{') && inner.ends_with('}') {
        return Some(inner);
      }
    }
  }

  let start = raw.find('{')?;
  let end = raw.rfind('}')?;
  (end > start).then(|| raw[start..=end].trim())
}

/// Parse model output into `T`, or `None` when no object can be read.
pub fn parse_object<T: DeserializeOwned>(raw: &str) -> Option<T> {
  let candidate = extract_json_object(raw)?;
  match serde_json::from_str(candidate) {
    Ok(v) => Some(v),
    Err(e) => {
      tracing::warn!("unreadable model JSON: {e}");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Status {
    status: String,
  }

  #[test]
  fn reads_fenced_json() {
    let raw = "Sure!\n```json\n{\"status\": \"Normal situation\"}\n```\nAnything else?";
    assert_eq!(
      parse_object::<Status>(raw),
      Some(Status { status: "Normal situation".into() })
    );
  }

  #[test]
  fn reads_bare_fence_and_surrounding_prose() {
    assert!(parse_object::<Status>("```\n{\"status\":\"x\"}\n```").is_some());
    assert!(parse_object::<Status>("Result: {\"status\":\"x\"} done").is_some());
  }

  #[test]
  fn garbage_is_none() {
    assert!(parse_object::<Status>("no json here").is_none());
    assert!(parse_object::<Status>("} backwards {").is_none());
    assert!(parse_object::<Status>("{\"other\": 1}").is_none());
  }
}
