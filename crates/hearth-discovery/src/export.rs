//! [`RecordExporter`] implementations.

use std::time::Duration;

use hearth_core::{export::RecordExporter, record::ComprehensiveRecord};
use serde::Deserialize;
use serde_json::json;

use crate::{Error, Result};

/// Writes the record to the log. The default when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExporter;

impl RecordExporter for LogExporter {
  type Error = Error;

  async fn export(&self, email: String, record: ComprehensiveRecord) -> Result<()> {
    let body = serde_json::to_string(&record)?;
    tracing::info!(%email, record = %body, "comprehensive record ready");
    Ok(())
  }
}

/// POSTs `{email, record}` as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookExporter {
  http: reqwest::Client,
  url:  String,
}

impl WebhookExporter {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { http, url: url.into() })
  }
}

impl RecordExporter for WebhookExporter {
  type Error = Error;

  async fn export(&self, email: String, record: ComprehensiveRecord) -> Result<()> {
    let response = self
      .http
      .post(&self.url)
      .json(&json!({ "email": email, "record": record }))
      .send()
      .await?;
    let status = response.status();
    if !status.is_success() {
      return Err(Error::Export(format!("webhook returned {status}")));
    }
    tracing::info!(%email, "record exported");
    Ok(())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
  /// When set, records go to this URL; otherwise they are logged.
  pub webhook_url:  Option<String>,
  pub timeout_secs: Option<u64>,
}

/// The exporter picked by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredExporter {
  Log(LogExporter),
  Webhook(WebhookExporter),
}

impl ConfiguredExporter {
  pub fn from_config(config: &ExportConfig) -> Result<Self> {
    match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
      Some(url) => {
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(10));
        Ok(Self::Webhook(WebhookExporter::new(url, timeout)?))
      }
      None => Ok(Self::Log(LogExporter)),
    }
  }
}

impl RecordExporter for ConfiguredExporter {
  type Error = Error;

  async fn export(&self, email: String, record: ComprehensiveRecord) -> Result<()> {
    match self {
      Self::Log(e) => e.export(email, record).await,
      Self::Webhook(e) => e.export(email, record).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_webhook_means_log() {
    let cfg = ExportConfig { webhook_url: Some("  ".into()), timeout_secs: None };
    assert!(matches!(
      ConfiguredExporter::from_config(&cfg).unwrap(),
      ConfiguredExporter::Log(_)
    ));

    let cfg = ExportConfig { webhook_url: Some("http://127.0.0.1:9/hook".into()), timeout_secs: Some(1) };
    assert!(matches!(
      ConfiguredExporter::from_config(&cfg).unwrap(),
      ConfiguredExporter::Webhook(_)
    ));
  }

  #[tokio::test]
  async fn log_exporter_succeeds() {
    LogExporter
      .export("a@b.co".into(), ComprehensiveRecord::default())
      .await
      .unwrap();
  }
}
