//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Lifecycle(#[from] chatclock_core::Error),
}

impl ApiError {
  fn status_and_code(&self) -> (StatusCode, &'static str) {
    use chatclock_core::Error as E;
    match self {
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
      ApiError::Lifecycle(e) => match e {
        E::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        E::DuplicateRecord(_) => (StatusCode::CONFLICT, "duplicate_record"),
        E::AlreadyArchived(_) => (StatusCode::CONFLICT, "already_archived"),
        E::InvalidDuration(_) => (StatusCode::BAD_REQUEST, "invalid_duration"),
        E::InvalidPolicy(_) => (StatusCode::BAD_REQUEST, "invalid_policy"),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();
    let retryable = match &self {
      ApiError::Lifecycle(e) => e.is_retryable(),
      ApiError::BadRequest(_) => false,
    };
    (
      status,
      Json(json!({
        "error":     self.to_string(),
        "code":      code,
        "retryable": retryable,
      })),
    )
      .into_response()
  }
}
