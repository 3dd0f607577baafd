//! Error types for `chatclock-core`.

use thiserror::Error;

use crate::id::ConversationId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("lifecycle record already exists for conversation {0}")]
  DuplicateRecord(ConversationId),

  #[error("no lifecycle record for conversation {0}")]
  NotFound(ConversationId),

  #[error("cannot extend a closed chat: {0} is archived")]
  AlreadyArchived(ConversationId),

  #[error("invalid duration: {0}")]
  InvalidDuration(String),

  #[error("invalid lifecycle policy: {0}")]
  InvalidPolicy(String),
}

impl Error {
  /// The engine has no transient failure modes; nothing is worth retrying.
  pub fn is_retryable(&self) -> bool { false }

  /// Whether the error is a rejection the end user should see, as opposed to
  /// a caller bug.
  pub fn is_user_facing(&self) -> bool {
    matches!(self, Self::AlreadyArchived(_) | Self::InvalidDuration(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
