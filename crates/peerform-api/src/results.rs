//! Handlers for the aggregation endpoints — professor-only reporting.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/progress[?section=…]` | Per-student completion over the caller's forms |
//! | `GET` | `/instances/:id/results` | Per-question averages and comments |
//! | `GET` | `/responses/:id` | One response with per-choice selection flags |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use peerform_core::{
  report::{InstanceResults, ResponseDetail, StudentProgress, rollup_titles},
  store::SurveyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Identity, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ProgressParams {
  pub section: Option<Uuid>,
}

/// `GET /progress[?section=<id>]`
pub async fn progress<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Query(params): Query<ProgressParams>,
) -> Result<Json<Vec<StudentProgress>>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let rollup = state
    .store
    .course_progress(identity.user_id, params.section)
    .await?
    .into_iter()
    .map(|mut p| {
      // Duplicate titles collapse to "Title (N)" for display; the counts
      // keep the raw multiset totals.
      p.assigned_titles = rollup_titles(&p.assigned_titles);
      p.completed_titles = rollup_titles(&p.completed_titles);
      p.incomplete_titles = rollup_titles(&p.incomplete_titles);
      p
    })
    .collect::<Vec<StudentProgress>>();
  Ok(Json(rollup))
}

/// `GET /instances/:id/results`
pub async fn instance_results<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(instance_id): Path<Uuid>,
) -> Result<Json<InstanceResults>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let results = state.store.question_results(instance_id).await?;
  Ok(Json(results))
}

/// `GET /responses/:id`
pub async fn answer_detail<S>(
  State(state): State<AppState<S>>,
  identity: Identity,
  Path(response_id): Path<Uuid>,
) -> Result<Json<ResponseDetail>, ApiError>
where
  S: SurveyStore,
{
  identity.require_professor()?;
  let detail = state.store.answer_detail(response_id).await?;
  Ok(Json(detail))
}
