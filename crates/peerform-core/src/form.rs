//! Survey form types — the reusable templates professors author.
//!
//! A form owns its questions; a question of the rating kind owns an ordered
//! choice list whose 0-based position is the rating value. Forms are
//! versionless: saving over an existing (title, creator) pair replaces the
//! entire question set in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Upper bound on the choice list of a rating question.
pub const MAX_CHOICES: usize = 5;

// ─── Question kind ───────────────────────────────────────────────────────────

/// The two supported question shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  /// Free-text answer; no choices.
  ShortAnswer,
  /// Answer is the 0-based index into the question's choice list.
  Rating,
}

// ─── Stored form ─────────────────────────────────────────────────────────────

/// A survey form header as listed for management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
  pub survey_form_id: Uuid,
  pub form_title:     String,
  pub is_default:     bool,
  pub created_by:     Uuid,
  pub created_at:     DateTime<Utc>,
}

/// One question as loaded with its form, choices in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormQuestion {
  pub question_id:   Uuid,
  pub question_text: String,
  pub kind:          QuestionKind,
  /// Choice count for rating questions; `None` for short answers.
  pub max_rating:    Option<u32>,
  pub choices:       Vec<String>,
}

/// A form header plus its ordered question set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDetail {
  pub survey_form_id: Uuid,
  pub form_title:     String,
  pub instructions:   String,
  pub questions:      Vec<FormQuestion>,
}

// ─── Input types ─────────────────────────────────────────────────────────────

/// One question in a save payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
  pub text:    String,
  pub kind:    QuestionKind,
  #[serde(default)]
  pub choices: Vec<String>,
}

/// Input to [`crate::store::SurveyStore::save_form`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewForm {
  pub title:           String,
  #[serde(default)]
  pub instructions:    String,
  pub questions:       Vec<NewQuestion>,
  /// Confirms replacement of an existing (title, creator) form. Without it,
  /// a duplicate save fails with [`Error::DuplicateTitle`] so the caller
  /// can prompt for confirmation.
  #[serde(default)]
  pub force_overwrite: bool,
}

impl NewForm {
  /// Reject malformed payloads before any write is attempted.
  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::EmptyTitle);
    }
    for q in &self.questions {
      match q.kind {
        QuestionKind::ShortAnswer if !q.choices.is_empty() => {
          return Err(Error::ChoicesOnShortAnswer(q.text.clone()));
        }
        QuestionKind::Rating
          if q.choices.is_empty() || q.choices.len() > MAX_CHOICES =>
        {
          return Err(Error::BadChoiceCount {
            question: q.text.clone(),
            count:    q.choices.len(),
            max:      MAX_CHOICES,
          });
        }
        _ => {}
      }
    }
    Ok(())
  }
}

/// Outcome of a save: the form id and whether an existing form was replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedForm {
  pub survey_form_id: Uuid,
  pub updated:        bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rating(text: &str, choices: &[&str]) -> NewQuestion {
    NewQuestion {
      text:    text.into(),
      kind:    QuestionKind::Rating,
      choices: choices.iter().map(|s| s.to_string()).collect(),
    }
  }

  fn form(questions: Vec<NewQuestion>) -> NewForm {
    NewForm {
      title: "Peer Eval".into(),
      instructions: String::new(),
      questions,
      force_overwrite: false,
    }
  }

  #[test]
  fn empty_title_rejected() {
    let mut f = form(vec![]);
    f.title = "   ".into();
    assert!(matches!(f.validate(), Err(Error::EmptyTitle)));
  }

  #[test]
  fn rating_needs_one_to_five_choices() {
    let f = form(vec![rating("Effort", &[])]);
    assert!(matches!(f.validate(), Err(Error::BadChoiceCount { .. })));

    let f = form(vec![rating("Effort", &["a", "b", "c", "d", "e", "f"])]);
    assert!(matches!(f.validate(), Err(Error::BadChoiceCount { .. })));

    let f = form(vec![rating("Effort", &["Poor", "OK", "Great"])]);
    assert!(f.validate().is_ok());
  }

  #[test]
  fn short_answer_must_not_carry_choices() {
    let f = form(vec![NewQuestion {
      text:    "Comments".into(),
      kind:    QuestionKind::ShortAnswer,
      choices: vec!["stray".into()],
    }]);
    assert!(matches!(f.validate(), Err(Error::ChoicesOnShortAnswer(_))));
  }
}
