//! Lifecycle timing policy.
//!
//! The grace period, warning window, and default extension length are
//! configurable per conversation kind. A [`PolicySet`] holds the default
//! policy plus any per-kind overrides.

use std::collections::HashMap;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Timing rules applied to a conversation when its record is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
  /// Time after the reference event ends before the conversation archives.
  #[serde(with = "crate::secs")]
  pub grace_period:      TimeDelta,
  /// Time before closing during which the conversation is in `Warning`.
  #[serde(with = "crate::secs")]
  pub warning_window:    TimeDelta,
  /// Extension applied when the caller does not name a length.
  #[serde(with = "crate::secs")]
  pub default_extension: TimeDelta,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      grace_period:      TimeDelta::hours(6),
      warning_window:    TimeDelta::minutes(10),
      default_extension: TimeDelta::hours(6),
    }
  }
}

impl LifecyclePolicy {
  pub fn validate(&self) -> Result<()> {
    if self.grace_period < TimeDelta::zero() {
      return Err(Error::InvalidPolicy("grace period is negative".into()));
    }
    if self.warning_window < TimeDelta::zero() {
      return Err(Error::InvalidPolicy("warning window is negative".into()));
    }
    if self.default_extension <= TimeDelta::zero() {
      return Err(Error::InvalidPolicy(
        "default extension must be positive".into(),
      ));
    }
    Ok(())
  }
}

// ─── Policy set ──────────────────────────────────────────────────────────────

/// The default policy plus overrides keyed by conversation kind.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
  default: LifecyclePolicy,
  by_kind: HashMap<String, LifecyclePolicy>,
}

impl PolicySet {
  pub fn new(default: LifecyclePolicy) -> Result<Self> {
    default.validate()?;
    Ok(Self {
      default,
      by_kind: HashMap::new(),
    })
  }

  /// Register an override for conversations of `kind`.
  pub fn with_kind(
    mut self,
    kind: impl Into<String>,
    policy: LifecyclePolicy,
  ) -> Result<Self> {
    let kind = kind.into();
    policy
      .validate()
      .map_err(|e| Error::InvalidPolicy(format!("kind {kind:?}: {e}")))?;
    self.by_kind.insert(kind, policy);
    Ok(self)
  }

  /// The policy for `kind`, falling back to the default for unknown or
  /// absent kinds.
  pub fn resolve(&self, kind: Option<&str>) -> &LifecyclePolicy {
    kind
      .and_then(|k| self.by_kind.get(k))
      .unwrap_or(&self.default)
  }

  pub fn default_policy(&self) -> &LifecyclePolicy { &self.default }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_six_hours_and_ten_minutes() {
    let p = LifecyclePolicy::default();
    assert_eq!(p.grace_period, TimeDelta::hours(6));
    assert_eq!(p.warning_window, TimeDelta::minutes(10));
    assert_eq!(p.default_extension, TimeDelta::hours(6));
    p.validate().unwrap();
  }

  #[test]
  fn rejects_non_positive_default_extension() {
    let p = LifecyclePolicy {
      default_extension: TimeDelta::zero(),
      ..Default::default()
    };
    assert!(matches!(PolicySet::new(p), Err(Error::InvalidPolicy(_))));
  }

  #[test]
  fn resolves_kind_override_and_falls_back() {
    let short = LifecyclePolicy {
      grace_period: TimeDelta::hours(1),
      ..Default::default()
    };
    let set = PolicySet::default().with_kind("meetup", short).unwrap();
    assert_eq!(set.resolve(Some("meetup")).grace_period, TimeDelta::hours(1));
    assert_eq!(set.resolve(Some("other")).grace_period, TimeDelta::hours(6));
    assert_eq!(set.resolve(None).grace_period, TimeDelta::hours(6));
  }

  #[test]
  fn serialises_durations_as_seconds() {
    let json = serde_json::to_value(LifecyclePolicy::default()).unwrap();
    assert_eq!(json["warning_window"], 600);
    let back: LifecyclePolicy = serde_json::from_value(json).unwrap();
    assert_eq!(back, LifecyclePolicy::default());
  }
}
