//! Handlers for deploying instances and managing assignments.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/forms/:id/assign` | Professor only; deploys an instance |
//! | `POST` | `/forms/:id/unassign` | Professor only; completed work is left alone |
//! | `GET`  | `/forms/:id/assigned` | Professor only; unassign picker |
//! | `POST` | `/instances/:id/assign` | Professor only; add students to an instance |
//! | `GET`  | `/me/pending` | Caller's not-yet-started queue |

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use peerform_core::{
  instance::{InstanceTarget, PendingSurvey, SurveyInstance},
  store::SurveyStore,
  user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError, extract::Json};

// ─── Deploy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeployBody {
  pub deadline: DateTime<Utc>,
  pub target:   InstanceTarget,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
  pub instance: SurveyInstance,
  /// Assignments created alongside the instance.
  pub assigned: u32,
}

/// `POST /forms/:id/assign` — body:
/// `{"deadline":"…","target":{"kind":"section","id":"…"}}`.
///
/// A section target assigns every currently enrolled student; an individual
/// target carries its single assignment with the instance.
pub async fn deploy<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(form_id): Path<Uuid>,
  Json(body): Json<DeployBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;

  let instance = state
    .store
    .create_instance(form_id, body.deadline, body.target)
    .await?;

  let assigned = match body.target {
    InstanceTarget::Section(section_id) => {
      let roster = state.store.section_students(section_id).await?;
      let ids: Vec<Uuid> = roster.iter().map(|u| u.user_id).collect();
      state.store.assign_students(instance.instance_id, &ids).await?
    }
    InstanceTarget::Student(_) => 1,
  };

  Ok((StatusCode::CREATED, Json(DeployResponse { instance, assigned })))
}

// ─── Assign / unassign ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StudentIds {
  pub student_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AssignedCount {
  pub assigned: u32,
}

/// `POST /instances/:id/assign` — body: `{"student_ids":["…"]}`
pub async fn assign_more<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(instance_id): Path<Uuid>,
  Json(body): Json<StudentIds>,
) -> Result<Json<AssignedCount>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let assigned = state
    .store
    .assign_students(instance_id, &body.student_ids)
    .await?;
  Ok(Json(AssignedCount { assigned }))
}

#[derive(Debug, Serialize)]
pub struct RemovedCount {
  pub removed: u32,
}

/// `POST /forms/:id/unassign` — body: `{"student_ids":["…"]}`
pub async fn unassign<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(form_id): Path<Uuid>,
  Json(body): Json<StudentIds>,
) -> Result<Json<RemovedCount>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let removed = state.store.unassign(form_id, &body.student_ids).await?;
  Ok(Json(RemovedCount { removed }))
}

/// `GET /forms/:id/assigned`
pub async fn assigned<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(form_id): Path<Uuid>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let students = state.store.list_assigned_students(form_id).await?;
  Ok(Json(students))
}

// ─── Pending queue ───────────────────────────────────────────────────────────

/// `GET /me/pending`
pub async fn my_pending<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
) -> Result<Json<Vec<PendingSurvey>>, ApiError>
where
  S: SurveyStore,
{
  let pending = state.store.list_pending(identity.user_id).await?;
  Ok(Json(pending))
}
