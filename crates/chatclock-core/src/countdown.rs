//! Countdown display values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time left until a conversation closes, broken into whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
  pub expired: bool,
  pub hours:   u64,
  pub minutes: u64,
  pub seconds: u64,
}

impl TimeRemaining {
  pub const EXPIRED: Self = Self {
    expired: true,
    hours:   0,
    minutes: 0,
    seconds: 0,
  };

  /// Decompose `closing - now`. Each unit is floored; a non-positive
  /// difference is expired.
  pub fn until(closing: DateTime<Utc>, now: DateTime<Utc>) -> Self {
    let diff = closing.signed_duration_since(now);
    if diff <= chrono::TimeDelta::zero() {
      return Self::EXPIRED;
    }
    let total = diff.num_seconds().unsigned_abs();
    Self {
      expired: false,
      hours:   total / 3600,
      minutes: (total % 3600) / 60,
      seconds: total % 60,
    }
  }
}

impl fmt::Display for TimeRemaining {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.expired {
      f.write_str("archived")
    } else if self.hours > 0 {
      write!(f, "{}h {}m remaining", self.hours, self.minutes)
    } else if self.minutes > 0 {
      write!(f, "{}m {}s remaining", self.minutes, self.seconds)
    } else {
      write!(f, "{}s remaining", self.seconds)
    }
  }
}
