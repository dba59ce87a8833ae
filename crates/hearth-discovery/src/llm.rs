//! [`OpenAiGenerator`] — a [`TextGenerator`] speaking the OpenAI-compatible
//! `/chat/completions` API.

use std::time::Duration;

use hearth_core::generate::{CompletionRequest, TextGenerator};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// e.g. `https://api.openai.com/v1`; `/chat/completions` is appended.
  pub base_url:     String,
  pub api_key:      Option<String>,
  pub model:        String,
  pub timeout_secs: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://api.openai.com/v1".to_owned(),
      api_key:      None,
      model:        "gpt-4o-mini".to_owned(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
  http:   reqwest::Client,
  config: LlmConfig,
}

impl OpenAiGenerator {
  pub fn new(config: LlmConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { http, config })
  }

  fn body(&self, request: &CompletionRequest) -> Value {
    let mut body = json!({
      "model": self.config.model,
      "messages": request.messages,
      "max_tokens": request.max_tokens,
      "temperature": request.temperature,
    });
    if request.purpose.expects_json() {
      body["response_format"] = json!({ "type": "json_object" });
    }
    body
  }
}

impl TextGenerator for OpenAiGenerator {
  type Error = Error;

  async fn generate(&self, request: CompletionRequest) -> Result<String> {
    let api_key = self
      .config
      .api_key
      .as_deref()
      .filter(|k| !k.trim().is_empty())
      .ok_or(Error::MissingApiKey)?;

    let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
    let response = self
      .http
      .post(url)
      .bearer_auth(api_key)
      .json(&self.body(&request))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::ModelStatus { status: status.as_u16(), body });
    }

    let payload: Value = response.json().await?;
    completion_text(&payload).ok_or(Error::EmptyCompletion)
  }
}

/// `choices[0].message.content`, trimmed, when non-empty.
fn completion_text(payload: &Value) -> Option<String> {
  payload
    .get("choices")
    .and_then(Value::as_array)
    .and_then(|choices| choices.first())
    .and_then(|choice| choice.get("message"))
    .and_then(|msg| msg.get("content"))
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use hearth_core::generate::Purpose;

  use super::*;

  #[test]
  fn reads_first_choice() {
    let payload = json!({
      "choices": [{ "message": { "role": "assistant", "content": "  Hi there  " } }]
    });
    assert_eq!(completion_text(&payload).as_deref(), Some("Hi there"));
    assert_eq!(completion_text(&json!({ "choices": [] })), None);
  }

  #[test]
  fn json_purposes_request_json_format() {
    let g = OpenAiGenerator::new(LlmConfig::default()).unwrap();
    let body = g.body(&CompletionRequest::new(Purpose::Classify, "sys", "user"));
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "system");

    let body = g.body(&CompletionRequest::new(Purpose::ScriptedReply, "sys", "user"));
    assert!(body.get("response_format").is_none());
  }

  #[tokio::test]
  async fn missing_key_fails_fast() {
    let g = OpenAiGenerator::new(LlmConfig::default()).unwrap();
    let err = g
      .generate(CompletionRequest::new(Purpose::Closing, "sys", "user"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::MissingApiKey));
  }
}
