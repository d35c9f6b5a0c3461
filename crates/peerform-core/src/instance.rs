//! Survey instances and assignments.
//!
//! An instance is one deployment of a form with a deadline, scoped to
//! exactly one of a section or an individual student. An assignment is the
//! obligation of one evaluator to respond to one instance; at most one
//! assignment exists per (instance, student) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The scope an instance is deployed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InstanceTarget {
  /// Class-wide: every enrolled student is eligible for an assignment.
  Section(Uuid),
  /// Individual: exactly one assignment is created with the instance.
  Student(Uuid),
}

/// A deployed survey. Immutable once created; deadlines are absolute UTC
/// passthrough, no timezone conversion is applied anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyInstance {
  pub instance_id:    Uuid,
  pub survey_form_id: Uuid,
  /// Set for section-scoped instances; `None` for individual targets.
  pub section_id:     Option<Uuid>,
  pub deadline:       DateTime<Utc>,
  pub assigned_at:    DateTime<Utc>,
}

/// An instance a student can still start: assigned, not completed, and with
/// no draft in flight (drafts surface through the draft listing instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSurvey {
  pub instance_id:    Uuid,
  pub survey_form_id: Uuid,
  pub form_title:     String,
  pub section_id:     Option<Uuid>,
  pub deadline:       DateTime<Utc>,
  pub assigned_at:    DateTime<Utc>,
  pub professor_name: Option<String>,
}
