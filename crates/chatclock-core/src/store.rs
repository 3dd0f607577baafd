//! The `LifecycleStore` trait and subscription handles.
//!
//! The trait is implemented by service backends (e.g. `chatclock-memory`).
//! Higher layers (`chatclock-api`, `chatclock-server`) depend on this
//! abstraction, not on any concrete backend.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
  Result,
  countdown::TimeRemaining,
  event::LifecycleEvent,
  id::{ActorId, ConversationId},
  record::{LifecycleRecord, NewRecord},
};

// ─── Subscriptions ───────────────────────────────────────────────────────────

/// A callback invoked with every event a subscription matches.
pub type Handler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Handle returned by [`LifecycleStore::subscribe`].
///
/// Dropping the handle leaves the subscription in place; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping a Subscription does not unsubscribe it"]
pub struct Subscription {
  cancel: Box<dyn FnOnce() + Send>,
}

impl Subscription {
  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Self {
      cancel: Box::new(cancel),
    }
  }

  pub fn unsubscribe(self) { (self.cancel)() }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription").finish_non_exhaustive()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A keyed collection of lifecycle records.
///
/// Every method is synchronous and does no I/O. Mutations of one
/// conversation are serialised; different conversations never contend.
/// Events produced by a call are delivered to subscribers after the record
/// has been updated, and a failing subscriber never undoes the update.
pub trait LifecycleStore: Send + Sync {
  /// Create the record for a conversation.
  ///
  /// Fails with [`crate::Error::DuplicateRecord`] if one already exists.
  fn initialize(&self, input: NewRecord) -> Result<LifecycleRecord>;

  /// Snapshot of the stored record, without re-deriving its phase.
  fn get_record(&self, id: &ConversationId) -> Result<LifecycleRecord>;

  /// Snapshots of every record, ordered by conversation id.
  fn list_records(&self) -> Vec<LifecycleRecord>;

  /// Re-derive the phase at `now`, commit it, and notify on a boundary
  /// crossing.
  fn observe(
    &self,
    id: &ConversationId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord>;

  /// Push the closing time out. `hours` defaults to the record's policy.
  ///
  /// Fails with [`crate::Error::AlreadyArchived`] once the conversation is
  /// archived at `now`.
  fn extend(
    &self,
    id: &ConversationId,
    hours: Option<f64>,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord>;

  /// Archive immediately. Idempotent.
  fn deactivate(
    &self,
    id: &ConversationId,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord>;

  /// Observe every record at `now`, returning the events emitted.
  fn sweep(&self, now: DateTime<Utc>) -> Vec<LifecycleEvent>;

  /// Destroy the record of a deleted conversation.
  fn remove(&self, id: &ConversationId) -> Result<LifecycleRecord>;

  /// Deliver events for one conversation to `handler`.
  fn subscribe(&self, id: &ConversationId, handler: Handler) -> Subscription;

  /// Deliver events for every conversation to `handler`.
  fn subscribe_all(&self, handler: Handler) -> Subscription;

  // ── Provided ──────────────────────────────────────────────────────────

  fn time_remaining(
    &self,
    id: &ConversationId,
    now: DateTime<Utc>,
  ) -> Result<TimeRemaining> {
    Ok(self.get_record(id)?.time_remaining(now))
  }

  fn is_in_warning_period(
    &self,
    id: &ConversationId,
    now: DateTime<Utc>,
  ) -> Result<bool> {
    Ok(self.get_record(id)?.is_in_warning_period(now))
  }

  fn is_expired(&self, id: &ConversationId, now: DateTime<Utc>) -> Result<bool> {
    Ok(self.get_record(id)?.is_expired(now))
  }
}
