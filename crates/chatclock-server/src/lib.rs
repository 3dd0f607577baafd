//! HTTP server for the chatclock lifecycle engine.
//!
//! Wires a [`MemoryStore`] to the JSON API, runs the periodic sweep that
//! commits time-driven transitions, and logs every lifecycle event.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use chatclock_core::{
  clock::Clock,
  event::LifecycleEvent,
  policy::{LifecyclePolicy, PolicySet},
  store::{LifecycleStore, Subscription},
};
use chatclock_memory::MemoryStore;
use chrono::TimeDelta;
use serde::Deserialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  /// Seconds between sweeps over every record.
  #[serde(default = "default_sweep_interval")]
  pub sweep_interval_secs: u64,
  #[serde(default)]
  pub policy:              PolicyConfig,
  /// Per-kind overrides of `policy`.
  #[serde(default)]
  pub kinds:               HashMap<String, PolicyConfig>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_sweep_interval() -> u64 { 60 }

/// Lifecycle timings in minutes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
  pub grace_period_mins:      i64,
  pub warning_window_mins:    i64,
  pub default_extension_mins: i64,
}

impl Default for PolicyConfig {
  fn default() -> Self {
    Self {
      grace_period_mins:      360,
      warning_window_mins:    10,
      default_extension_mins: 360,
    }
  }
}

impl TryFrom<PolicyConfig> for LifecyclePolicy {
  type Error = chatclock_core::Error;

  fn try_from(c: PolicyConfig) -> Result<Self, Self::Error> {
    let minutes = |field: &str, mins: i64| {
      TimeDelta::try_minutes(mins).ok_or_else(|| {
        chatclock_core::Error::InvalidPolicy(format!(
          "{field} of {mins} minutes is out of range"
        ))
      })
    };
    let policy = LifecyclePolicy {
      grace_period:      minutes("grace_period_mins", c.grace_period_mins)?,
      warning_window:    minutes("warning_window_mins", c.warning_window_mins)?,
      default_extension: minutes(
        "default_extension_mins",
        c.default_extension_mins,
      )?,
    };
    policy.validate()?;
    Ok(policy)
  }
}

impl ServerConfig {
  /// Build the [`PolicySet`] from the default policy and per-kind overrides.
  pub fn policies(&self) -> Result<PolicySet, chatclock_core::Error> {
    let mut set = PolicySet::new(self.policy.try_into()?)?;
    for (kind, policy) in &self.kinds {
      set = set.with_kind(kind.clone(), (*policy).try_into()?)?;
    }
    Ok(set)
  }

  pub fn sweep_interval(&self) -> anyhow::Result<Duration> {
    anyhow::ensure!(
      self.sweep_interval_secs > 0,
      "sweep_interval_secs must be positive"
    );
    Ok(Duration::from_secs(self.sweep_interval_secs))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: `/health` plus the API under `/api`.
pub fn router<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Router
where
  S: LifecycleStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", chatclock_api::api_router(store, clock))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str { "ok" }

// ─── Background work ──────────────────────────────────────────────────────────

/// Build the store for `config`.
pub fn build_store(config: &ServerConfig) -> anyhow::Result<MemoryStore> {
  Ok(MemoryStore::new(config.policies()?))
}

/// Sweep every record on a fixed interval so time-driven transitions are
/// committed (and notified) even when nobody polls a conversation.
pub fn spawn_sweeper<S>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  every: Duration,
) -> JoinHandle<()>
where
  S: LifecycleStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      let events = store.sweep(clock.now());
      tracing::trace!(transitions = events.len(), "sweep finished");
    }
  })
}

/// Log every lifecycle event. This is where a realtime fan-out to connected
/// clients would hook in.
pub fn log_events<S>(store: &S) -> Subscription
where
  S: LifecycleStore + ?Sized,
{
  store.subscribe_all(Arc::new(|event: &LifecycleEvent| {
    tracing::info!(
      conversation = %event.conversation_id,
      from = %event.from,
      to = %event.to,
      cause = ?event.cause,
      at = %event.at,
      "lifecycle transition",
    );
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chatclock_core::{
    clock::ManualClock, id::ConversationId, phase::Phase, record::NewRecord,
  };
  use chrono::{TimeZone, Utc};
  use config::{Config, File, FileFormat};
  use tower::ServiceExt as _;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.sweep_interval().unwrap(), Duration::from_secs(60));
    let policies = cfg.policies().unwrap();
    assert_eq!(*policies.default_policy(), LifecyclePolicy::default());
  }

  #[test]
  fn kind_overrides_are_applied() {
    let cfg = parse(
      r#"
        port = 9000

        [policy]
        warning_window_mins = 15

        [kinds.flash]
        grace_period_mins = 30
        default_extension_mins = 20
      "#,
    );
    assert_eq!(cfg.port, 9000);
    let policies = cfg.policies().unwrap();
    assert_eq!(
      policies.resolve(None).warning_window,
      TimeDelta::minutes(15)
    );
    let flash = policies.resolve(Some("flash"));
    assert_eq!(flash.grace_period, TimeDelta::minutes(30));
    assert_eq!(flash.warning_window, TimeDelta::minutes(10));
    assert_eq!(flash.default_extension, TimeDelta::minutes(20));
  }

  #[test]
  fn invalid_policy_is_rejected() {
    let cfg = parse("[policy]\ndefault_extension_mins = 0\n");
    assert!(matches!(
      cfg.policies(),
      Err(chatclock_core::Error::InvalidPolicy(_))
    ));
    assert!(build_store(&cfg).is_err());
  }

  #[test]
  fn zero_sweep_interval_is_rejected() {
    let cfg = parse("sweep_interval_secs = 0\n");
    assert!(cfg.sweep_interval().is_err());
  }

  #[tokio::test]
  async fn health_and_nested_api_respond() {
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let app = router(store, clock);

    let resp = app
      .clone()
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
      .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, serde_json::json!([]));
  }

  #[tokio::test]
  async fn sweeper_archives_expired_records() {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
    let store = Arc::new(MemoryStore::default());
    store.initialize(NewRecord::new("c1", t)).unwrap();
    let clock = Arc::new(ManualClock::new(t + TimeDelta::hours(7)));

    let handle =
      spawn_sweeper(store.clone(), clock, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let record = store.get_record(&ConversationId::new("c1")).unwrap();
    assert_eq!(record.phase(), Phase::Archived);
    assert!(record.is_read_only());
  }

  #[test]
  fn log_events_subscription_can_be_removed() {
    let store = MemoryStore::default();
    let sub = log_events(&store);
    assert_eq!(store.notifier().len(), 1);
    sub.unsubscribe();
    assert!(store.notifier().is_empty());
  }
}
