//! The three lifecycle phases of a conversation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a conversation stands relative to its closing time.
///
/// The ordering is meaningful: phases only ever move forward
/// (`Active < Warning < Archived`) except when an extension resets a
/// `Warning` record to `Active`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
  Active,
  /// Inside the warning window before the closing time.
  Warning,
  /// Terminal. The conversation is read-only.
  Archived,
}

impl Phase {
  pub fn is_read_only(self) -> bool { matches!(self, Self::Archived) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ordering_follows_the_lifecycle() {
    assert!(Phase::Active < Phase::Warning);
    assert!(Phase::Warning < Phase::Archived);
  }

  #[test]
  fn string_forms_are_snake_case() {
    assert_eq!(Phase::Warning.to_string(), "warning");
    assert_eq!("archived".parse::<Phase>().unwrap(), Phase::Archived);
    assert_eq!(serde_json::to_string(&Phase::Active).unwrap(), "\"active\"");
  }
}
