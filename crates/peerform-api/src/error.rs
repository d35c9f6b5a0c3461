//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use peerform_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      CoreError::FormNotFound(_)
      | CoreError::InstanceNotFound(_)
      | CoreError::ResponseNotFound(_)
      | CoreError::SectionNotFound(_)
      | CoreError::UserNotFound(_) => ApiError::NotFound(e.to_string()),

      CoreError::DraftNotOwned(_) => ApiError::Forbidden(e.to_string()),

      CoreError::DuplicateTitle(_) => ApiError::Conflict(e.to_string()),

      CoreError::EmptyTitle
      | CoreError::BadChoiceCount { .. }
      | CoreError::ChoicesOnShortAnswer(_) => ApiError::BadRequest(e.to_string()),

      CoreError::Store(_) => ApiError::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };

    let body = Json(json!({ "error": message }));
    if status == StatusCode::UNAUTHORIZED {
      (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
    } else {
      (status, body).into_response()
    }
  }
}
