//! `hearth` server binary.
//!
//! Reads `hearth.toml` (or the path given with `--config`) plus `HEARTH_*`
//! environment overrides, then serves the conversation API under `/api` and
//! the built-in calendar provider at `/schedule`.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use hearth_server::{ServerConfig, build_app};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Hearth discovery conversation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "hearth.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;
  let app = build_app(&server_cfg).await?;
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
