//! [`MemoryStore`], the in-memory implementation of [`LifecycleStore`].

use std::{
  collections::{HashMap, hash_map::Entry},
  sync::{Arc, Mutex, MutexGuard, RwLock},
};

use chatclock_core::{
  Error, Result,
  event::LifecycleEvent,
  id::{ActorId, ConversationId},
  policy::PolicySet,
  record::{LifecycleRecord, NewRecord},
  store::{Handler, LifecycleStore, Subscription},
};
use chrono::{DateTime, Utc};

use crate::notify::Notifier;

type Slot = Arc<Mutex<LifecycleRecord>>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A lifecycle store held entirely in memory.
///
/// Cloning is cheap; clones share the same records and subscribers.
#[derive(Clone)]
pub struct MemoryStore {
  inner: Arc<Inner>,
}

struct Inner {
  policies: PolicySet,
  records:  RwLock<HashMap<ConversationId, Slot>>,
  notifier: Arc<Notifier>,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new(PolicySet::default()) }
}

impl MemoryStore {
  pub fn new(policies: PolicySet) -> Self {
    Self {
      inner: Arc::new(Inner {
        policies,
        records: RwLock::new(HashMap::new()),
        notifier: Notifier::new(),
      }),
    }
  }

  pub fn policies(&self) -> &PolicySet { &self.inner.policies }

  pub fn notifier(&self) -> &Arc<Notifier> { &self.inner.notifier }

  pub fn len(&self) -> usize { self.read_map().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn read_map(
    &self,
  ) -> std::sync::RwLockReadGuard<'_, HashMap<ConversationId, Slot>> {
    self.inner.records.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write_map(
    &self,
  ) -> std::sync::RwLockWriteGuard<'_, HashMap<ConversationId, Slot>> {
    self.inner.records.write().unwrap_or_else(|e| e.into_inner())
  }

  fn slot(&self, id: &ConversationId) -> Result<Slot> {
    self
      .read_map()
      .get(id)
      .cloned()
      .ok_or_else(|| Error::NotFound(id.clone()))
  }

  /// Run `f` against the record under its lock, then deliver whatever events
  /// it produced once the lock is released. Events are delivered even when
  /// `f` fails, since `f` may have committed an observation first.
  fn with_record<T>(
    &self,
    id: &ConversationId,
    f: impl FnOnce(&mut LifecycleRecord, &mut Vec<LifecycleEvent>) -> Result<T>,
  ) -> Result<T> {
    let slot = self.slot(id)?;
    let mut events = Vec::new();
    let result = {
      let mut record = lock(&slot);
      f(&mut *record, &mut events)
    };
    self.publish(&events);
    result
  }

  fn publish(&self, events: &[LifecycleEvent]) {
    for event in events {
      let delivered = self.inner.notifier.dispatch(event);
      tracing::debug!(
        conversation = %event.conversation_id,
        from = %event.from,
        to = %event.to,
        delivered,
        "lifecycle event published",
      );
    }
  }
}

fn lock(slot: &Slot) -> MutexGuard<'_, LifecycleRecord> {
  slot.lock().unwrap_or_else(|e| e.into_inner())
}

// ─── LifecycleStore impl ─────────────────────────────────────────────────────

impl LifecycleStore for MemoryStore {
  fn initialize(&self, input: NewRecord) -> Result<LifecycleRecord> {
    let policy = self.inner.policies.resolve(input.kind.as_deref());
    let record = LifecycleRecord::new(input, policy)?;

    match self.write_map().entry(record.conversation_id().clone()) {
      Entry::Occupied(e) => Err(Error::DuplicateRecord(e.key().clone())),
      Entry::Vacant(e) => {
        e.insert(Arc::new(Mutex::new(record.clone())));
        tracing::info!(
          conversation = %record.conversation_id(),
          closing_time = %record.closing_time(),
          phase = %record.phase(),
          "lifecycle record initialised",
        );
        Ok(record)
      }
    }
  }

  fn get_record(&self, id: &ConversationId) -> Result<LifecycleRecord> {
    let slot = self.slot(id)?;
    let record = lock(&slot).clone();
    Ok(record)
  }

  fn list_records(&self) -> Vec<LifecycleRecord> {
    let slots: Vec<Slot> = self.read_map().values().cloned().collect();
    let mut records: Vec<LifecycleRecord> =
      slots.iter().map(|slot| lock(slot).clone()).collect();
    records.sort_by(|a, b| a.conversation_id().cmp(b.conversation_id()));
    records
  }

  fn observe(
    &self,
    id: &ConversationId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord> {
    self.with_record(id, |record, events| {
      events.extend(record.observe(now));
      Ok(record.clone())
    })
  }

  fn extend(
    &self,
    id: &ConversationId,
    hours: Option<f64>,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord> {
    self.with_record(id, |record, events| {
      events.extend(record.observe(now));
      events.extend(record.extend(hours, actor, now)?);
      Ok(record.clone())
    })
  }

  fn deactivate(
    &self,
    id: &ConversationId,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Result<LifecycleRecord> {
    self.with_record(id, |record, events| {
      events.extend(record.observe(now));
      events.extend(record.deactivate(actor, now));
      Ok(record.clone())
    })
  }

  fn sweep(&self, now: DateTime<Utc>) -> Vec<LifecycleEvent> {
    let slots: Vec<Slot> = self.read_map().values().cloned().collect();
    let events: Vec<LifecycleEvent> = slots
      .iter()
      .filter_map(|slot| lock(slot).observe(now))
      .collect();
    self.publish(&events);
    if !events.is_empty() {
      tracing::info!(
        records = slots.len(),
        transitions = events.len(),
        "lifecycle sweep committed transitions",
      );
    }
    events
  }

  fn remove(&self, id: &ConversationId) -> Result<LifecycleRecord> {
    let slot = self
      .write_map()
      .remove(id)
      .ok_or_else(|| Error::NotFound(id.clone()))?;
    tracing::info!(conversation = %id, "lifecycle record removed");
    let record = lock(&slot).clone();
    Ok(record)
  }

  fn subscribe(&self, id: &ConversationId, handler: Handler) -> Subscription {
    self.inner.notifier.subscribe(id, handler)
  }

  fn subscribe_all(&self, handler: Handler) -> Subscription {
    self.inner.notifier.subscribe_all(handler)
  }
}
