//! Users, sections, and enrollment — the roster the engine is driven by.
//!
//! Credential issuance lives outside the engine; a user here is only the
//! verified identity and role the survey operations act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role attached to a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Student,
  Professor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

impl User {
  /// "First Last", as shown next to assigned surveys.
  pub fn display_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Input to [`crate::store::SurveyStore::add_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
  pub role:       Role,
}

/// One offering of a course; survey instances can be scoped to a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
  pub section_id:  Uuid,
  pub course_name: String,
  pub section_num: String,
  pub term:        String,
  pub year:        i32,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::SurveyStore::add_section`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
  pub course_name: String,
  pub section_num: String,
  pub term:        String,
  pub year:        i32,
}
