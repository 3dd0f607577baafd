//! Phase-change notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{id::ConversationId, phase::Phase};

/// What moved a record from one phase to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
  /// Time passed a boundary.
  Elapsed,
  Extended,
  Deactivated,
}

/// Emitted once per phase boundary a record crosses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
  pub event_id:        Uuid,
  pub conversation_id: ConversationId,
  pub from:            Phase,
  pub to:              Phase,
  pub at:              DateTime<Utc>,
  pub cause:           TransitionCause,
}

impl LifecycleEvent {
  pub fn new(
    conversation_id: ConversationId,
    from: Phase,
    to: Phase,
    at: DateTime<Utc>,
    cause: TransitionCause,
  ) -> Self {
    Self {
      event_id: Uuid::new_v4(),
      conversation_id,
      from,
      to,
      at,
      cause,
    }
  }
}
