//! [`Notifier`], the subscriber registry behind `subscribe`.

use std::{
  collections::BTreeMap,
  panic::{AssertUnwindSafe, catch_unwind},
  sync::{
    Arc, RwLock, Weak,
    atomic::{AtomicU64, Ordering},
  },
};

use chatclock_core::{
  event::LifecycleEvent,
  id::ConversationId,
  store::{Handler, Subscription},
};

#[derive(Clone)]
enum Scope {
  Conversation(ConversationId),
  All,
}

impl Scope {
  fn matches(&self, event: &LifecycleEvent) -> bool {
    match self {
      Self::Conversation(id) => *id == event.conversation_id,
      Self::All => true,
    }
  }
}

/// Fans lifecycle events out to registered handlers.
///
/// Delivery is best-effort: a handler that panics is logged and skipped, and
/// the remaining handlers still run.
#[derive(Default)]
pub struct Notifier {
  next_id:  AtomicU64,
  handlers: RwLock<BTreeMap<u64, (Scope, Handler)>>,
}

impl Notifier {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn subscribe(
    self: &Arc<Self>,
    id: &ConversationId,
    handler: Handler,
  ) -> Subscription {
    self.register(Scope::Conversation(id.clone()), handler)
  }

  pub fn subscribe_all(self: &Arc<Self>, handler: Handler) -> Subscription {
    self.register(Scope::All, handler)
  }

  /// Number of live subscriptions.
  pub fn len(&self) -> usize {
    self
      .handlers
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Deliver `event` to every matching handler. Returns how many handlers
  /// completed without panicking.
  pub fn dispatch(&self, event: &LifecycleEvent) -> usize {
    // Handlers run without the registry lock held so they may subscribe or
    // unsubscribe from inside a callback.
    let matching: Vec<Handler> = self
      .handlers
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .values()
      .filter(|(scope, _)| scope.matches(event))
      .map(|(_, handler)| handler.clone())
      .collect();

    let mut delivered = 0;
    for handler in matching {
      match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(()) => delivered += 1,
        Err(_) => tracing::warn!(
          conversation = %event.conversation_id,
          event_id = %event.event_id,
          "lifecycle subscriber panicked; event dropped for that subscriber",
        ),
      }
    }
    delivered
  }

  fn register(self: &Arc<Self>, scope: Scope, handler: Handler) -> Subscription {
    let key = self.next_id.fetch_add(1, Ordering::Relaxed);
    self
      .handlers
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .insert(key, (scope, handler));

    let registry: Weak<Self> = Arc::downgrade(self);
    Subscription::new(move || {
      if let Some(registry) = registry.upgrade() {
        registry
          .handlers
          .write()
          .unwrap_or_else(|e| e.into_inner())
          .remove(&key);
      }
    })
  }
}
