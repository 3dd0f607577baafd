//! chatclock server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), builds the
//! in-memory lifecycle store, starts the sweeper, and serves the JSON API
//! over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chatclock_core::clock::{Clock, SystemClock};
use chatclock_server::{ServerConfig, build_store, log_events, router, spawn_sweeper};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "chatclock lifecycle server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("CHATCLOCK")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = Arc::new(
    build_store(&server_cfg).context("invalid lifecycle policy configuration")?,
  );
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let sweep_every = server_cfg.sweep_interval()?;

  // Kept for the lifetime of the process.
  let _event_log = log_events(store.as_ref());
  let _sweeper = spawn_sweeper(store.clone(), clock.clone(), sweep_every);

  let app = router(store, clock);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    sweep_interval_secs = sweep_every.as_secs(),
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
