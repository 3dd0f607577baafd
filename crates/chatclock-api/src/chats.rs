//! Handlers for `/chats` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/chats` | Every record |
//! | `POST`   | `/chats` | Body: [`InitBody`]; returns 201 + record |
//! | `GET`    | `/chats/:id/lifecycle` | Commits the phase at the current time |
//! | `GET`    | `/chats/:id/countdown` | [`CountdownView`] |
//! | `PUT`    | `/chats/:id/extend` | Body: [`ExtendBody`] |
//! | `PUT`    | `/chats/:id/deactivate` | Body: [`DeactivateBody`] |
//! | `DELETE` | `/chats/:id` | Returns 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chatclock_core::{
  countdown::TimeRemaining,
  id::{ActorId, ConversationId},
  phase::Phase,
  record::{InitialStatus, LifecycleRecord, NewRecord},
  store::LifecycleStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /chats`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Json<Vec<LifecycleRecord>>
where
  S: LifecycleStore,
{
  Json(state.store.list_records())
}

// ─── Initialise ───────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /chats`.
#[derive(Debug, Deserialize)]
pub struct InitBody {
  pub conversation_id:    ConversationId,
  pub reference_end_time: DateTime<Utc>,
  #[serde(default)]
  pub status:             InitialStatus,
  pub kind:               Option<String>,
}

impl From<InitBody> for NewRecord {
  fn from(b: InitBody) -> Self {
    NewRecord {
      conversation_id:    b.conversation_id,
      reference_end_time: b.reference_end_time,
      initial_status:     b.status,
      kind:               b.kind,
    }
  }
}

/// `POST /chats` returns 201 + the new record.
pub async fn initialize<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<InitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LifecycleStore,
{
  if body.conversation_id.as_str().is_empty() {
    return Err(ApiError::BadRequest("conversation_id is empty".into()));
  }
  let record = state.store.initialize(NewRecord::from(body))?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

/// `GET /chats/:id/lifecycle`: the authoritative record as of now.
pub async fn lifecycle<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ConversationId>,
) -> Result<Json<LifecycleRecord>, ApiError>
where
  S: LifecycleStore,
{
  let record = state.store.observe(&id, state.clock.now())?;
  Ok(Json(record))
}

// ─── Countdown ────────────────────────────────────────────────────────────────

/// Response body for `GET /chats/:id/countdown`.
#[derive(Debug, Serialize)]
pub struct CountdownView {
  pub conversation_id: ConversationId,
  pub phase:           Phase,
  pub is_read_only:    bool,
  #[serde(flatten)]
  pub remaining:       TimeRemaining,
  /// Human-readable countdown, e.g. `"5h 12m remaining"`.
  pub label:           String,
}

/// `GET /chats/:id/countdown`: read-only; does not commit the phase.
pub async fn countdown<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ConversationId>,
) -> Result<Json<CountdownView>, ApiError>
where
  S: LifecycleStore,
{
  let now = state.clock.now();
  let record = state.store.get_record(&id)?;
  let phase = record.derive_phase(now);
  let remaining = record.time_remaining(now);
  Ok(Json(CountdownView {
    conversation_id: id,
    phase,
    is_read_only: phase.is_read_only(),
    remaining,
    label: remaining.to_string(),
  }))
}

// ─── Extend ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtendBody {
  /// The admin performing the extension. Authorisation happens upstream.
  pub actor_id: ActorId,
  /// Defaults to the conversation's policy.
  pub hours:    Option<f64>,
}

/// `PUT /chats/:id/extend`, body: `{"actor_id":"...","hours":6}`.
///
/// An archived conversation answers 409 with code `already_archived`; the
/// client must not offer a retry.
pub async fn extend<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ConversationId>,
  Json(body): Json<ExtendBody>,
) -> Result<Json<LifecycleRecord>, ApiError>
where
  S: LifecycleStore,
{
  let record =
    state
      .store
      .extend(&id, body.hours, &body.actor_id, state.clock.now())?;
  Ok(Json(record))
}

// ─── Deactivate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeactivateBody {
  pub actor_id: ActorId,
}

/// `PUT /chats/:id/deactivate`. Idempotent.
pub async fn deactivate<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ConversationId>,
  Json(body): Json<DeactivateBody>,
) -> Result<Json<LifecycleRecord>, ApiError>
where
  S: LifecycleStore,
{
  let record = state
    .store
    .deactivate(&id, &body.actor_id, state.clock.now())?;
  Ok(Json(record))
}

// ─── Remove ───────────────────────────────────────────────────────────────────

/// `DELETE /chats/:id`
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ConversationId>,
) -> Result<StatusCode, ApiError>
where
  S: LifecycleStore,
{
  state.store.remove(&id)?;
  Ok(StatusCode::NO_CONTENT)
}
