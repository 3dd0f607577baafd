//! Serialise a [`TimeDelta`] as a whole number of seconds.

use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

pub fn serialize<S: Serializer>(
  delta: &TimeDelta,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.serialize_i64(delta.num_seconds())
}

pub fn deserialize<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<TimeDelta, D::Error> {
  let secs = i64::deserialize(deserializer)?;
  TimeDelta::try_seconds(secs)
    .ok_or_else(|| D::Error::custom(format!("duration of {secs}s is out of range")))
}
