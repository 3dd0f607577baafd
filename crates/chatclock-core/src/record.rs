//! The per-conversation lifecycle record and its transitions.
//!
//! A record's stored `phase` is the last phase an observation or mutation
//! committed. The current phase is always re-derived from the record and a
//! caller-supplied `now` by [`LifecycleRecord::derive_phase`]; nothing here
//! reads the clock or schedules work.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  countdown::TimeRemaining,
  event::{LifecycleEvent, TransitionCause},
  id::{ActorId, ConversationId},
  phase::Phase,
  policy::LifecyclePolicy,
};

// ─── Input ───────────────────────────────────────────────────────────────────

/// The status a conversation is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialStatus {
  #[default]
  Active,
  /// The conversation was already closed when it was bound.
  Archived,
}

/// Input to [`crate::store::LifecycleStore::initialize`].
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub conversation_id:    ConversationId,
  /// When the real-world event the conversation is attached to ended.
  pub reference_end_time: DateTime<Utc>,
  pub initial_status:     InitialStatus,
  /// Selects a per-kind [`LifecyclePolicy`].
  pub kind:               Option<String>,
}

impl NewRecord {
  /// Convenience constructor for an active conversation of no particular
  /// kind.
  pub fn new(
    conversation_id: impl Into<ConversationId>,
    reference_end_time: DateTime<Utc>,
  ) -> Self {
    Self {
      conversation_id: conversation_id.into(),
      reference_end_time,
      initial_status: InitialStatus::default(),
      kind: None,
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Lifecycle state for one conversation.
///
/// Fields are private so that the invariants hold for every value:
/// `closing_time >= reference_end_time`, `is_read_only` iff the stored phase
/// is `Archived`, `Archived` is terminal, and `extension_count` and
/// `last_extension_time` only move forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRecord {
  conversation_id:      ConversationId,
  kind:                 Option<String>,
  reference_end_time:   DateTime<Utc>,
  closing_time:         DateTime<Utc>,
  phase:                Phase,
  is_read_only:         bool,
  extension_count:      u32,
  last_extension_time:  Option<DateTime<Utc>>,
  last_extended_by:     Option<ActorId>,
  warning_acknowledged: bool,
  archived_at:          Option<DateTime<Utc>>,
  archived_by:          Option<ActorId>,
  #[serde(with = "crate::secs")]
  warning_window:       TimeDelta,
  #[serde(with = "crate::secs")]
  default_extension:    TimeDelta,
}

impl LifecycleRecord {
  /// Build a fresh record. `closing_time` is the reference end time plus the
  /// policy's grace period.
  pub fn new(input: NewRecord, policy: &LifecyclePolicy) -> Result<Self> {
    policy.validate()?;
    let closing_time = input
      .reference_end_time
      .checked_add_signed(policy.grace_period)
      .ok_or_else(|| {
        Error::InvalidDuration("closing time is out of range".into())
      })?;
    let archived = input.initial_status == InitialStatus::Archived;

    Ok(Self {
      conversation_id: input.conversation_id,
      kind: input.kind,
      reference_end_time: input.reference_end_time,
      closing_time,
      phase: if archived { Phase::Archived } else { Phase::Active },
      is_read_only: archived,
      extension_count: 0,
      last_extension_time: None,
      last_extended_by: None,
      warning_acknowledged: false,
      archived_at: None,
      archived_by: None,
      warning_window: policy.warning_window,
      default_extension: policy.default_extension,
    })
  }

  pub fn conversation_id(&self) -> &ConversationId { &self.conversation_id }

  pub fn kind(&self) -> Option<&str> { self.kind.as_deref() }

  pub fn reference_end_time(&self) -> DateTime<Utc> { self.reference_end_time }

  pub fn closing_time(&self) -> DateTime<Utc> { self.closing_time }

  /// The last committed phase. Use [`Self::derive_phase`] for the phase at a
  /// given instant.
  pub fn phase(&self) -> Phase { self.phase }

  pub fn is_read_only(&self) -> bool { self.is_read_only }

  pub fn extension_count(&self) -> u32 { self.extension_count }

  pub fn last_extension_time(&self) -> Option<DateTime<Utc>> {
    self.last_extension_time
  }

  pub fn last_extended_by(&self) -> Option<&ActorId> {
    self.last_extended_by.as_ref()
  }

  pub fn warning_acknowledged(&self) -> bool { self.warning_acknowledged }

  pub fn archived_at(&self) -> Option<DateTime<Utc>> { self.archived_at }

  /// Who deactivated the conversation; `None` if it archived on its own.
  pub fn archived_by(&self) -> Option<&ActorId> { self.archived_by.as_ref() }

  pub fn warning_window(&self) -> TimeDelta { self.warning_window }

  pub fn default_extension(&self) -> TimeDelta { self.default_extension }

  // ── Pure derivations ──────────────────────────────────────────────────

  /// The phase at `now`.
  ///
  /// Never earlier than the stored phase, so a record that has been observed
  /// in `Warning` stays there until extended even if `now` goes backwards.
  pub fn derive_phase(&self, now: DateTime<Utc>) -> Phase {
    let by_clock = if now >= self.closing_time {
      Phase::Archived
    } else if self.closing_time - now <= self.warning_window {
      Phase::Warning
    } else {
      Phase::Active
    };
    self.phase.max(by_clock)
  }

  /// Countdown to `closing_time`. Archived records are always expired, even
  /// when deactivated ahead of their closing time.
  pub fn time_remaining(&self, now: DateTime<Utc>) -> TimeRemaining {
    if self.phase == Phase::Archived {
      return TimeRemaining::EXPIRED;
    }
    TimeRemaining::until(self.closing_time, now)
  }

  pub fn is_in_warning_period(&self, now: DateTime<Utc>) -> bool {
    self.derive_phase(now) == Phase::Warning
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.derive_phase(now) == Phase::Archived
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// Commit the phase derived at `now`.
  ///
  /// Returns the event for the boundary crossed, if any. Entering `Warning`
  /// is reported once per countdown window.
  pub fn observe(&mut self, now: DateTime<Utc>) -> Option<LifecycleEvent> {
    let next = self.derive_phase(now);
    if next == self.phase {
      return None;
    }
    let from = self.phase;

    match next {
      Phase::Archived => {
        self.archive(self.closing_time, None);
        tracing::debug!(
          conversation = %self.conversation_id,
          %from,
          "conversation reached its closing time",
        );
      }
      Phase::Warning => {
        self.phase = Phase::Warning;
        if self.warning_acknowledged {
          return None;
        }
        self.warning_acknowledged = true;
        tracing::debug!(
          conversation = %self.conversation_id,
          closing_time = %self.closing_time,
          "conversation entered its warning window",
        );
      }
      Phase::Active => return None,
    }

    Some(self.event(from, next, now, TransitionCause::Elapsed))
  }

  /// Push the closing time out by `hours` (or the record's default
  /// extension), measured from the later of the current closing time and
  /// `now`.
  ///
  /// Fails with [`Error::AlreadyArchived`] if the record is archived at
  /// `now`; the record is left untouched. Returns a `Warning -> Active` event
  /// when the extension lifts the record out of its warning window.
  pub fn extend(
    &mut self,
    hours: Option<f64>,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Result<Option<LifecycleEvent>> {
    let length = extension_length(hours, self.default_extension)?;
    if self.derive_phase(now) == Phase::Archived {
      return Err(Error::AlreadyArchived(self.conversation_id.clone()));
    }

    let closing_time = self
      .closing_time
      .max(now)
      .checked_add_signed(length)
      .ok_or_else(|| {
        Error::InvalidDuration("closing time is out of range".into())
      })?;

    let from = self.phase;
    self.closing_time = closing_time;
    self.phase = Phase::Active;
    self.warning_acknowledged = false;
    self.extension_count = self.extension_count.saturating_add(1);
    self.last_extension_time =
      Some(self.last_extension_time.map_or(now, |prev| prev.max(now)));
    self.last_extended_by = Some(actor.clone());

    tracing::info!(
      conversation = %self.conversation_id,
      actor = %actor,
      closing_time = %self.closing_time,
      extensions = self.extension_count,
      "conversation extended",
    );

    Ok((from != Phase::Active).then(|| {
      self.event(from, Phase::Active, now, TransitionCause::Extended)
    }))
  }

  /// Archive immediately. A no-op on an archived record.
  pub fn deactivate(
    &mut self,
    actor: &ActorId,
    now: DateTime<Utc>,
  ) -> Option<LifecycleEvent> {
    if self.phase == Phase::Archived {
      return None;
    }
    let from = self.phase;
    self.archive(now, Some(actor.clone()));
    tracing::info!(
      conversation = %self.conversation_id,
      actor = %actor,
      %from,
      "conversation deactivated",
    );
    Some(self.event(from, Phase::Archived, now, TransitionCause::Deactivated))
  }

  fn archive(&mut self, at: DateTime<Utc>, by: Option<ActorId>) {
    self.phase = Phase::Archived;
    self.is_read_only = true;
    self.archived_at = Some(at);
    self.archived_by = by;
  }

  fn event(
    &self,
    from: Phase,
    to: Phase,
    at: DateTime<Utc>,
    cause: TransitionCause,
  ) -> LifecycleEvent {
    LifecycleEvent::new(self.conversation_id.clone(), from, to, at, cause)
  }
}

/// Convert a caller-supplied hour count into a positive duration.
fn extension_length(
  hours: Option<f64>,
  default: TimeDelta,
) -> Result<TimeDelta> {
  let Some(hours) = hours else {
    return Ok(default);
  };
  if !hours.is_finite() || hours <= 0.0 {
    return Err(Error::InvalidDuration(format!(
      "extension must be a positive number of hours, got {hours}"
    )));
  }
  let millis = (hours * 3_600_000.0).round();
  if millis < 1.0 || millis >= i64::MAX as f64 {
    return Err(Error::InvalidDuration(format!(
      "extension of {hours} hours is out of range"
    )));
  }
  TimeDelta::try_milliseconds(millis as i64).ok_or_else(|| {
    Error::InvalidDuration(format!("extension of {hours} hours is out of range"))
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn t() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap() }

  fn admin() -> ActorId { ActorId::new("admin-1") }

  fn record() -> LifecycleRecord {
    LifecycleRecord::new(NewRecord::new("c1", t()), &LifecyclePolicy::default())
      .unwrap()
  }

  // ── Construction ──────────────────────────────────────────────────────

  #[test]
  fn new_record_closes_six_hours_after_reference() {
    let r = record();
    assert_eq!(r.closing_time(), t() + TimeDelta::hours(6));
    assert_eq!(r.phase(), Phase::Active);
    assert!(!r.is_read_only());
    assert_eq!(r.extension_count(), 0);
    assert!(r.last_extension_time().is_none());
    assert!(!r.warning_acknowledged());
  }

  #[test]
  fn archived_initial_status_is_read_only() {
    let mut input = NewRecord::new("c1", t());
    input.initial_status = InitialStatus::Archived;
    let r = LifecycleRecord::new(input, &LifecyclePolicy::default()).unwrap();
    assert_eq!(r.phase(), Phase::Archived);
    assert!(r.is_read_only());
    assert_eq!(r.derive_phase(t()), Phase::Archived);
  }

  #[test]
  fn policy_sets_closing_time_and_window() {
    let policy = LifecyclePolicy {
      grace_period: TimeDelta::hours(1),
      warning_window: TimeDelta::minutes(30),
      ..Default::default()
    };
    let r = LifecycleRecord::new(NewRecord::new("c1", t()), &policy).unwrap();
    assert_eq!(r.closing_time(), t() + TimeDelta::hours(1));
    assert_eq!(r.derive_phase(t() + TimeDelta::minutes(31)), Phase::Warning);
  }

  // ── Derivation ────────────────────────────────────────────────────────

  #[test]
  fn derive_phase_boundaries() {
    let r = record();
    let closing = r.closing_time();
    assert_eq!(r.derive_phase(t()), Phase::Active);
    assert_eq!(
      r.derive_phase(closing - TimeDelta::minutes(10) - TimeDelta::seconds(1)),
      Phase::Active
    );
    assert_eq!(r.derive_phase(closing - TimeDelta::minutes(10)), Phase::Warning);
    assert_eq!(r.derive_phase(closing - TimeDelta::seconds(1)), Phase::Warning);
    assert_eq!(r.derive_phase(closing), Phase::Archived);
    assert!(r.is_in_warning_period(closing - TimeDelta::minutes(5)));
    assert!(r.is_expired(closing));
  }

  #[test]
  fn derive_phase_never_goes_back_after_observation() {
    let mut r = record();
    let closing = r.closing_time();
    r.observe(closing - TimeDelta::minutes(5));
    assert_eq!(r.derive_phase(t()), Phase::Warning);

    r.observe(closing + TimeDelta::minutes(1));
    assert_eq!(r.derive_phase(t()), Phase::Archived);
  }

  #[test]
  fn time_remaining_at_closing_is_expired() {
    let r = record();
    assert!(r.time_remaining(r.closing_time()).expired);
    let left = r.time_remaining(t() + TimeDelta::minutes(90));
    assert_eq!((left.hours, left.minutes, left.seconds), (4, 30, 0));
  }

  #[test]
  fn time_remaining_is_expired_once_deactivated() {
    let mut r = record();
    r.deactivate(&admin(), t());
    assert_eq!(r.time_remaining(t()), TimeRemaining::EXPIRED);
  }

  // ── Observation ───────────────────────────────────────────────────────

  #[test]
  fn observe_reports_warning_once() {
    let mut r = record();
    let warn_at = r.closing_time() - TimeDelta::minutes(5);

    let event = r.observe(warn_at).expect("warning event");
    assert_eq!((event.from, event.to), (Phase::Active, Phase::Warning));
    assert_eq!(event.cause, TransitionCause::Elapsed);
    assert!(r.warning_acknowledged());

    assert!(r.observe(warn_at).is_none());
    assert!(r.observe(warn_at + TimeDelta::minutes(1)).is_none());
  }

  #[test]
  fn observe_archives_at_closing_time() {
    let mut r = record();
    let closing = r.closing_time();
    r.observe(closing - TimeDelta::minutes(5));

    let event = r.observe(closing + TimeDelta::minutes(3)).unwrap();
    assert_eq!((event.from, event.to), (Phase::Warning, Phase::Archived));
    assert!(r.is_read_only());
    assert_eq!(r.archived_at(), Some(closing));
    assert!(r.archived_by().is_none());
    assert!(r.observe(closing + TimeDelta::hours(1)).is_none());
  }

  #[test]
  fn observe_can_jump_from_active_to_archived() {
    let mut r = record();
    let event = r.observe(r.closing_time() + TimeDelta::hours(2)).unwrap();
    assert_eq!((event.from, event.to), (Phase::Active, Phase::Archived));
  }

  // ── Extension ─────────────────────────────────────────────────────────

  #[test]
  fn extend_in_warning_anchors_on_the_later_time() {
    let mut r = record();
    let now = r.closing_time() - TimeDelta::minutes(5);
    r.observe(now);

    let event = r.extend(Some(6.0), &admin(), now).unwrap().unwrap();
    assert_eq!((event.from, event.to), (Phase::Warning, Phase::Active));
    assert_eq!(event.cause, TransitionCause::Extended);

    // The current closing time is later than `now`.
    assert_eq!(
      r.closing_time(),
      t() + TimeDelta::hours(6) + TimeDelta::hours(6)
    );
    assert_eq!(r.phase(), Phase::Active);
    assert_eq!(r.extension_count(), 1);
    assert_eq!(r.last_extension_time(), Some(now));
    assert_eq!(r.last_extended_by(), Some(&admin()));
    assert!(!r.warning_acknowledged());
  }

  #[test]
  fn extend_while_active_emits_nothing() {
    let mut r = record();
    let before = r.closing_time();
    let event = r.extend(None, &admin(), t()).unwrap();
    assert!(event.is_none());
    assert_eq!(r.closing_time(), before + TimeDelta::hours(6));
  }

  #[test]
  fn extend_accepts_fractional_hours() {
    let mut r = record();
    let before = r.closing_time();
    r.extend(Some(0.5), &admin(), t()).unwrap();
    assert_eq!(r.closing_time(), before + TimeDelta::minutes(30));
  }

  #[test]
  fn extend_rejects_bad_durations_without_mutating() {
    let mut r = record();
    let before = r.clone();
    for hours in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-12, 1e300] {
      let err = r.extend(Some(hours), &admin(), t()).unwrap_err();
      assert!(matches!(err, Error::InvalidDuration(_)), "{hours}: {err}");
    }
    assert_eq!(r, before);
  }

  #[test]
  fn extend_after_closing_is_rejected() {
    let mut r = record();
    let after = r.closing_time() + TimeDelta::seconds(1);
    let before = r.clone();
    let err = r.extend(Some(6.0), &admin(), after).unwrap_err();
    assert!(matches!(err, Error::AlreadyArchived(_)));
    assert!(err.is_user_facing());
    assert!(!err.is_retryable());
    assert_eq!(r, before);
  }

  #[test]
  fn extend_keeps_last_extension_time_moving_forward() {
    let mut r = record();
    r.extend(None, &admin(), t() + TimeDelta::hours(2)).unwrap();
    r.extend(None, &admin(), t() + TimeDelta::hours(1)).unwrap();
    assert_eq!(r.last_extension_time(), Some(t() + TimeDelta::hours(2)));
    assert_eq!(r.extension_count(), 2);
  }

  #[test]
  fn extend_never_lowers_closing_time() {
    let mut r = record();
    let mut now = t();
    for _ in 0..5 {
      let before = r.closing_time();
      r.extend(Some(1.0), &admin(), now).unwrap();
      assert!(r.closing_time() > before);
      assert!(r.closing_time() >= r.reference_end_time());
      now += TimeDelta::hours(1);
    }
  }

  // ── Deactivation ──────────────────────────────────────────────────────

  #[test]
  fn deactivate_archives_regardless_of_closing_time() {
    let mut r = record();
    let now = t() + TimeDelta::hours(1);
    let event = r.deactivate(&admin(), now).unwrap();
    assert_eq!((event.from, event.to), (Phase::Active, Phase::Archived));
    assert_eq!(event.cause, TransitionCause::Deactivated);
    assert_eq!(r.phase(), Phase::Archived);
    assert!(r.is_read_only());
    assert_eq!(r.archived_at(), Some(now));
    assert_eq!(r.archived_by(), Some(&admin()));
  }

  #[test]
  fn deactivate_is_idempotent() {
    let mut r = record();
    r.deactivate(&admin(), t());
    let once = r.clone();
    assert!(r.deactivate(&ActorId::new("someone-else"), t()).is_none());
    assert_eq!(r, once);
  }

  #[test]
  fn archived_record_cannot_be_extended() {
    let mut r = record();
    r.deactivate(&admin(), t());
    assert!(matches!(
      r.extend(Some(6.0), &admin(), t()),
      Err(Error::AlreadyArchived(_))
    ));
    assert_eq!(r.derive_phase(t()), Phase::Archived);
  }

  #[test]
  fn serialises_with_snake_case_phase_and_seconds() {
    let json = serde_json::to_value(record()).unwrap();
    assert_eq!(json["phase"], "active");
    assert_eq!(json["conversation_id"], "c1");
    assert_eq!(json["warning_window"], 600);
    assert_eq!(json["is_read_only"], false);
  }
}
