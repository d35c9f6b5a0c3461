//! Request-body extraction.
//!
//! [`Json`] wraps [`axum::Json`] so that an unparseable or mistyped body
//! surfaces as a 400 with the usual `{"error": …}` payload instead of
//! axum's default rejection response.

use axum::{
  extract::{FromRequest, Request, rejection::JsonRejection},
  response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::ApiError;

/// JSON body extractor and response wrapper with the API's error shape.
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    match axum::Json::<T>::from_request(req, state).await {
      Ok(axum::Json(value)) => Ok(Json(value)),
      Err(rejection) => Err(match rejection {
        JsonRejection::JsonDataError(e) => ApiError::BadRequest(e.body_text()),
        JsonRejection::JsonSyntaxError(e) => ApiError::BadRequest(e.body_text()),
        JsonRejection::MissingJsonContentType(e) => {
          ApiError::BadRequest(e.body_text())
        }
        other => ApiError::Internal(other.body_text()),
      }),
    }
  }
}

impl<T: Serialize> IntoResponse for Json<T> {
  fn into_response(self) -> Response {
    axum::Json(self.0).into_response()
  }
}
