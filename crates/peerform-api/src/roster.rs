//! Handlers for roster endpoints — users, sections, enrollment.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Professor only |
//! | `GET`  | `/users/:id` | 404 if not found |
//! | `POST` | `/sections` | Professor only |
//! | `POST` | `/sections/:id/enroll` | Professor only; idempotent |
//! | `GET`  | `/sections/:id/students` | Professor only |
//! | `GET`  | `/me/peers` | Subject picker for evaluators |

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use peerform_core::{
  store::SurveyStore,
  user::{NewSection, NewUser, User},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError, extract::Json};

/// `POST /users`
pub async fn create_user<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let user = state.store.add_user(body).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/:id`
pub async fn get_user<S>(
  State(state): State<AppState<S>>,
  _identity: Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: SurveyStore,
{
  let user = state
    .store
    .get_user(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}

/// `POST /sections`
pub async fn create_section<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Json(body): Json<NewSection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let section = state.store.add_section(body).await?;
  Ok((StatusCode::CREATED, Json(section)))
}

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
  pub student_id: Uuid,
}

/// `POST /sections/:id/enroll` — body: `{"student_id":"…"}`
pub async fn enroll<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(section_id): Path<Uuid>,
  Json(body): Json<EnrollBody>,
) -> Result<StatusCode, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  state.store.enroll(section_id, body.student_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /sections/:id/students`
pub async fn students<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(section_id): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let roster = state.store.section_students(section_id).await?;
  Ok(Json(roster))
}

/// One subject option in the evaluation picker.
#[derive(Debug, Serialize)]
pub struct PeerChoice {
  pub user_id: Uuid,
  pub name:    String,
}

/// `GET /me/peers` — the students the caller may pick as an evaluation
/// subject: everyone but themselves.
pub async fn peers<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<Vec<PeerChoice>>, ApiError>
where
  S: SurveyStore,
{
  let peers = state
    .store
    .list_peers(identity.user_id)
    .await?
    .into_iter()
    .map(|u| PeerChoice { user_id: u.user_id, name: u.display_name() })
    .collect::<Vec<_>>();
  Ok(Json(peers))
}
