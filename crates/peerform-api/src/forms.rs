//! Handlers for `/forms` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/forms` | Any authenticated caller |
//! | `POST`   | `/forms` | Professor only; 409 on duplicate title without `force_overwrite` |
//! | `GET`    | `/forms/:id` | Full question set |
//! | `DELETE` | `/forms/:id` | Professor only; cascades questions and choices |

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use peerform_core::{
  form::{FormDetail, FormSummary, NewForm},
  store::SurveyStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError, extract::Json};

/// `GET /forms`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _identity: Identity,
) -> Result<Json<Vec<FormSummary>>, ApiError>
where
  S: SurveyStore,
{
  let forms = state.store.list_forms().await?;
  Ok(Json(forms))
}

/// `POST /forms` — 201 on create, 200 when an existing form was overwritten.
pub async fn save<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Json(body): Json<NewForm>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let saved = state.store.save_form(identity.user_id, body).await?;
  let status = if saved.updated { StatusCode::OK } else { StatusCode::CREATED };
  Ok((status, Json(saved)))
}

/// `GET /forms/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<FormDetail>, ApiError>
where
  S: SurveyStore,
{
  let detail = state.store.load_form(id).await?;
  Ok(Json(detail))
}

/// `DELETE /forms/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  state.store.delete_form(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
