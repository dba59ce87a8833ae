//! Server configuration and application assembly for the `hearth` binary.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use hearth_discovery::{
  DiscoveryConfig, Facility, Orchestrator,
  export::{ConfiguredExporter, ExportConfig},
  llm::{LlmConfig, OpenAiGenerator},
};
use hearth_schedule::{BookingClient, BookingConfig, TimeResolver, calendar::Calendar};
use hearth_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Top-level server configuration, read from TOML and `HEARTH_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// SQLite database file. Sessions live in memory when unset.
  pub store_path:         Option<PathBuf>,
  /// Base for the `htmlLink` of events created by the built-in calendar.
  pub calendar_link_base: Option<String>,
  pub llm:                LlmConfig,
  pub booking:            BookingConfig,
  pub discovery:          DiscoveryConfig,
  pub facility:           Facility,
  pub export:             ExportConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_owned(),
      port:               8080,
      store_path:         None,
      calendar_link_base: None,
      llm:                LlmConfig::default(),
      booking:            BookingConfig::default(),
      discovery:          DiscoveryConfig::default(),
      facility:           Facility::default(),
      export:             ExportConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional file at `path` under the environment.
  ///
  /// Nested keys use a double underscore, e.g. `HEARTH_LLM__API_KEY`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("HEARTH")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Conversation routes under `/api`, the calendar provider at `/schedule`.
pub async fn build_app(cfg: &ServerConfig) -> anyhow::Result<Router> {
  let store = match &cfg.store_path {
    Some(path) => {
      let path = expand_tilde(path);
      SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?
    }
    None => {
      tracing::warn!("no store_path configured, sessions will not survive a restart");
      SqliteStore::open_in_memory()
        .await
        .context("failed to open in-memory store")?
    }
  };

  if cfg.llm.api_key.is_none() {
    tracing::warn!("no llm.api_key configured, replies will use fallback text");
  }
  let generator = OpenAiGenerator::new(cfg.llm.clone()).context("failed to build model client")?;
  let booker = BookingClient::new(cfg.booking.clone()).context("failed to build booking client")?;
  let exporter = ConfiguredExporter::from_config(&cfg.export).context("failed to build exporter")?;

  let orchestrator = Orchestrator::new(
    store,
    generator,
    booker,
    exporter,
    cfg.facility.clone(),
    cfg.discovery.clone(),
  )
  .context("failed to build orchestrator")?;

  let resolver = TimeResolver::from_name(&cfg.discovery.time_zone)
    .context("invalid discovery.time_zone")?;
  let mut calendar = Calendar::new(resolver);
  if let Some(base) = &cfg.calendar_link_base {
    calendar = calendar.with_link_base(base.clone());
  }

  Ok(
    Router::new()
      .nest("/api", hearth_api::api_router(Arc::new(orchestrator)))
      .merge(hearth_api::schedule_router(Arc::new(calendar)))
      .layer(TraceLayer::new_for_http()),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  fn from_toml(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert!(cfg.store_path.is_none());
    assert_eq!(cfg.discovery.time_zone, "America/New_York");
    assert!(!cfg.facility.locations.is_empty());
  }

  #[test]
  fn nested_sections_override_defaults() {
    let cfg = from_toml(
      r#"
      port = 9000

      [booking]
      base_url = "https://book.example.com"

      [discovery]
      proposed_visit = "Thursday 11am"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.booking.base_url, "https://book.example.com");
    assert_eq!(cfg.booking.duration_min, 60);
    assert_eq!(cfg.discovery.proposed_visit, "Thursday 11am");
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/hearth.db")), PathBuf::from(home).join("hearth.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }

  #[tokio::test]
  async fn app_serves_both_routers() {
    let app = build_app(&ServerConfig::default()).await.unwrap();

    // No api key: the first turn still answers, from the fallback text.
    let req = Request::builder()
      .method("POST")
      .uri("/api/messages")
      .header("content-type", "application/json")
      .body(Body::from(json!({"user_id": "u1", "text": "Hello"}).to_string()))
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let reply: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reply["metadata"]["stage"], "trust_building");

    let req = Request::builder()
      .method("POST")
      .uri("/schedule")
      .header("content-type", "application/json")
      .body(Body::from(
        json!({
          "email": "a@b.co",
          "startIso": "2030-05-08T14:00:00-04:00",
          "tz": "America/New_York",
          "roomId": "main-office",
          "agentId": "hearth",
          "durationMin": 60,
          "summary": "Community visit",
          "externalKey": "k1",
        })
        .to_string(),
      ))
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
  }
}
