//! [`Model`] — a [`TextGenerator`] with a deadline and safe defaults.

use std::time::Duration;

use hearth_core::generate::{CompletionRequest, TextGenerator};
use serde::de::DeserializeOwned;

use crate::{Error, Result, json::parse_object};

pub struct Model<G> {
  generator: G,
  timeout:   Duration,
}

impl<G: TextGenerator> Model<G> {
  pub fn new(generator: G, timeout: Duration) -> Self { Self { generator, timeout } }

  /// Generate text. Timeouts and blank answers are errors.
  pub async fn text(&self, request: CompletionRequest) -> Result<String> {
    let purpose = request.purpose;
    let text = tokio::time::timeout(self.timeout, self.generator.generate(request))
      .await
      .map_err(|_| Error::Timeout("text generation"))?
      .map_err(Error::generation)?;
    let text = tidy(&text);
    if text.is_empty() {
      return Err(Error::EmptyCompletion);
    }
    tracing::debug!(%purpose, "generated {} chars", text.len());
    Ok(text)
  }

  /// Generate text, or use `fallback` on any failure.
  pub async fn text_or(&self, request: CompletionRequest, fallback: impl FnOnce() -> String) -> String {
    let purpose = request.purpose;
    match self.text(request).await {
      Ok(text) => text,
      Err(e) => {
        tracing::warn!(%purpose, "using fallback reply: {e}");
        fallback()
      }
    }
  }

  /// Ask for a JSON object; `None` on failure or unreadable output.
  pub async fn object<T: DeserializeOwned>(&self, request: CompletionRequest) -> Option<T> {
    let purpose = request.purpose;
    match self.text(request).await {
      Ok(raw) => parse_object(&raw),
      Err(e) => {
        tracing::warn!(%purpose, "structured call failed: {e}");
        None
      }
    }
  }
}

/// Trim whitespace and one layer of wrapping quotes.
fn tidy(text: &str) -> String {
  let trimmed = text.trim();
  let unquoted = trimmed
    .strip_prefix('"')
    .and_then(|t| t.strip_suffix('"'))
    .unwrap_or(trimmed);
  unquoted.trim().to_owned()
}

#[cfg(test)]
mod tests {
  use super::tidy;

  #[test]
  fn tidy_strips_wrapping_quotes() {
    assert_eq!(tidy("  \"Hello there.\" \n"), "Hello there.");
    assert_eq!(tidy("She said \"hi\""), "She said \"hi\"");
  }
}
