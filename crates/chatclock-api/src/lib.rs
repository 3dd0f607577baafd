//! JSON REST API for chatclock.
//!
//! Exposes an axum [`Router`] backed by any
//! [`chatclock_core::store::LifecycleStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", chatclock_api::api_router(store.clone(), clock))
//! ```

pub mod chats;
pub mod error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, put},
};
use chatclock_core::{clock::Clock, store::LifecycleStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store: Arc<S>,
  /// Source of `now` for every time-dependent operation.
  pub clock: Arc<dyn Clock>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      clock: self.clock.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Router<()>
where
  S: LifecycleStore + 'static,
{
  Router::new()
    .route("/chats", get(chats::list::<S>).post(chats::initialize::<S>))
    .route("/chats/{id}", axum::routing::delete(chats::remove::<S>))
    .route("/chats/{id}/lifecycle", get(chats::lifecycle::<S>))
    .route("/chats/{id}/countdown", get(chats::countdown::<S>))
    .route("/chats/{id}/extend", put(chats::extend::<S>))
    .route("/chats/{id}/deactivate", put(chats::deactivate::<S>))
    .with_state(ApiState { store, clock })
}

// ─── Integration tests ────────────────────────────────────────────────────────
