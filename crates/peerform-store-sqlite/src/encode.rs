//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Question kinds are stored as the original
//! layout's `text` / `rating` discriminants.

use chrono::{DateTime, Utc};
use peerform_core::{
  Error, Result,
  form::{FormSummary, QuestionKind},
  instance::{PendingSurvey, SurveyInstance},
  response::{CompletedSurvey, DraftSummary},
  user::{Role, User},
};
use uuid::Uuid;

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| Error::Store(format!("bad uuid {s:?}: {e}")))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Store(format!("bad timestamp {s:?}: {e}")))
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Student => "student",
    Role::Professor => "professor",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "student" => Ok(Role::Student),
    "professor" => Ok(Role::Professor),
    other => Err(Error::Store(format!("unknown role: {other:?}"))),
  }
}

// ─── QuestionKind ────────────────────────────────────────────────────────────

pub fn encode_question_kind(k: QuestionKind) -> &'static str {
  match k {
    QuestionKind::ShortAnswer => "text",
    QuestionKind::Rating => "rating",
  }
}

pub fn decode_question_kind(s: &str) -> Result<QuestionKind> {
  match s {
    "text" => Ok(QuestionKind::ShortAnswer),
    "rating" => Ok(QuestionKind::Rating),
    other => Err(Error::Store(format!("unknown question type: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub role:       String,
  pub created_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      first_name: self.first_name,
      last_name:  self.last_name,
      email:      self.email,
      role:       decode_role(&self.role)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `survey_forms` row.
pub struct RawFormSummary {
  pub survey_form_id: String,
  pub form_title:     String,
  pub is_default:     bool,
  pub created_by:     String,
  pub created_at:     String,
}

impl RawFormSummary {
  pub fn into_summary(self) -> Result<FormSummary> {
    Ok(FormSummary {
      survey_form_id: decode_uuid(&self.survey_form_id)?,
      form_title:     self.form_title,
      is_default:     self.is_default,
      created_by:     decode_uuid(&self.created_by)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `survey_instances` row.
pub struct RawInstance {
  pub instance_id:    String,
  pub survey_form_id: String,
  pub section_id:     Option<String>,
  pub deadline:       String,
  pub assigned_at:    String,
}

impl RawInstance {
  pub fn into_instance(self) -> Result<SurveyInstance> {
    Ok(SurveyInstance {
      instance_id:    decode_uuid(&self.instance_id)?,
      survey_form_id: decode_uuid(&self.survey_form_id)?,
      section_id:     self.section_id.as_deref().map(decode_uuid).transpose()?,
      deadline:       decode_dt(&self.deadline)?,
      assigned_at:    decode_dt(&self.assigned_at)?,
    })
  }
}

/// Raw strings from the pending-surveys join (assignments × instances ×
/// forms × professor).
pub struct RawPending {
  pub instance_id:    String,
  pub survey_form_id: String,
  pub form_title:     String,
  pub section_id:     Option<String>,
  pub deadline:       String,
  pub assigned_at:    String,
  pub professor_name: Option<String>,
}

impl RawPending {
  pub fn into_pending(self) -> Result<PendingSurvey> {
    Ok(PendingSurvey {
      instance_id:    decode_uuid(&self.instance_id)?,
      survey_form_id: decode_uuid(&self.survey_form_id)?,
      form_title:     self.form_title,
      section_id:     self.section_id.as_deref().map(decode_uuid).transpose()?,
      deadline:       decode_dt(&self.deadline)?,
      assigned_at:    decode_dt(&self.assigned_at)?,
      professor_name: self.professor_name,
    })
  }
}

/// Raw strings from the draft-listing join.
pub struct RawDraft {
  pub response_id:    String,
  pub instance_id:    String,
  pub survey_form_id: String,
  pub form_title:     String,
  pub saved_at:       String,
  pub deadline:       String,
  pub professor_name: Option<String>,
}

impl RawDraft {
  pub fn into_draft(self) -> Result<DraftSummary> {
    Ok(DraftSummary {
      response_id:    decode_uuid(&self.response_id)?,
      instance_id:    decode_uuid(&self.instance_id)?,
      survey_form_id: decode_uuid(&self.survey_form_id)?,
      form_title:     self.form_title,
      saved_at:       decode_dt(&self.saved_at)?,
      deadline:       decode_dt(&self.deadline)?,
      professor_name: self.professor_name,
    })
  }
}

/// Raw strings from the completed-surveys listing.
pub struct RawCompleted {
  pub instance_id:  String,
  pub form_title:   String,
  pub submitted_at: String,
}

impl RawCompleted {
  pub fn into_completed(self) -> Result<CompletedSurvey> {
    Ok(CompletedSurvey {
      instance_id:  decode_uuid(&self.instance_id)?,
      form_title:   self.form_title,
      submitted_at: decode_dt(&self.submitted_at)?,
    })
  }
}
