//! Opaque identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the conversation a lifecycle record belongs to.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(String);

/// Identifies the user who extended or deactivated a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

macro_rules! opaque_id {
  ($ty:ident) => {
    impl $ty {
      pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

      pub fn as_str(&self) -> &str { &self.0 }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
      }
    }

    impl From<&str> for $ty {
      fn from(s: &str) -> Self { Self(s.to_owned()) }
    }

    impl From<String> for $ty {
      fn from(s: String) -> Self { Self(s) }
    }
  };
}

opaque_id!(ConversationId);
opaque_id!(ActorId);
