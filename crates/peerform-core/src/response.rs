//! Responses and answers — the draft → submitted state machine.
//!
//! A response is keyed by the (instance, evaluator, evaluated subject)
//! triple. Per triple the states are: absent → draft → submitted, with no
//! way back. The store enforces at most one open draft per triple; a
//! submitted response is immutable except for the draft-conversion path in
//! `submit`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// question_id → answer value. Values are free text for short answers and
/// the 0-based choice index rendered as a string for ratings.
pub type AnswerMap = BTreeMap<Uuid, String>;

/// A draft as listed for the evaluator, newest saved first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSummary {
  pub response_id:    Uuid,
  pub instance_id:    Uuid,
  pub survey_form_id: Uuid,
  pub form_title:     String,
  pub saved_at:       DateTime<Utc>,
  pub deadline:       DateTime<Utc>,
  pub professor_name: Option<String>,
}

/// A submitted evaluation of the caller, deduplicated by instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSurvey {
  pub instance_id:  Uuid,
  pub form_title:   String,
  pub submitted_at: DateTime<Utc>,
}
