//! Handlers for the draft/submit lifecycle.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/instances/:id/form` | Form rendered when starting or resuming |
//! | `POST` | `/instances/:id/draft` | Saves or refreshes the caller's draft |
//! | `POST` | `/instances/:id/submit` | Finalises; completes the assignment |
//! | `GET`  | `/me/drafts` | Caller's open drafts, newest saved first |
//! | `GET`  | `/drafts/:id` | Draft answers; 403 unless caller owns the open draft |
//! | `GET`  | `/me/completed` | Evaluations submitted about the caller |

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use peerform_core::{
  form::FormDetail,
  response::{AnswerMap, CompletedSurvey, DraftSummary},
  store::SurveyStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError, extract::Json};

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
  /// The teammate being evaluated.
  pub subject: Uuid,
  #[serde(default)]
  pub answers: AnswerMap,
}

#[derive(Debug, Serialize)]
pub struct ResponseId {
  pub response_id: Uuid,
}

/// `GET /instances/:id/form`
pub async fn instance_form<S>(
  State(state): State<AppState<S>>,
  _identity: Identity,
  Path(instance_id): Path<Uuid>,
) -> Result<Json<FormDetail>, ApiError>
where
  S: SurveyStore,
{
  let detail = state.store.load_instance_form(instance_id).await?;
  Ok(Json(detail))
}

/// `POST /instances/:id/draft` — body: `{"subject":"…","answers":{…}}`
pub async fn save_draft<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(instance_id): Path<Uuid>,
  Json(body): Json<ResponseBody>,
) -> Result<Json<ResponseId>, ApiError>
where
  S: SurveyStore,
{
  let response_id = state
    .store
    .save_draft(instance_id, identity.user_id, body.subject, body.answers)
    .await?;
  Ok(Json(ResponseId { response_id }))
}

/// `POST /instances/:id/submit` — body: `{"subject":"…","answers":{…}}`
pub async fn submit<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(instance_id): Path<Uuid>,
  Json(body): Json<ResponseBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  let response_id = state
    .store
    .submit(instance_id, identity.user_id, body.subject, body.answers)
    .await?;
  Ok((StatusCode::CREATED, Json(ResponseId { response_id })))
}

/// `GET /me/drafts`
pub async fn my_drafts<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<Vec<DraftSummary>>, ApiError>
where
  S: SurveyStore,
{
  let drafts = state.store.list_drafts(identity.user_id).await?;
  Ok(Json(drafts))
}

/// `GET /drafts/:id`
pub async fn draft_answers<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(response_id): Path<Uuid>,
) -> Result<Json<AnswerMap>, ApiError>
where
  S: SurveyStore,
{
  let answers = state
    .store
    .load_draft_answers(response_id, identity.user_id)
    .await?;
  Ok(Json(answers))
}

/// `GET /me/completed`
pub async fn my_completed<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<Vec<CompletedSurvey>>, ApiError>
where
  S: SurveyStore,
{
  let completed = state.store.list_completed(identity.user_id).await?;
  Ok(Json(completed))
}
