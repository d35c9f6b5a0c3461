//! Aggregation read models — computed from submitted responses only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::QuestionKind;

// ─── Course progress ─────────────────────────────────────────────────────────

/// Per-student completion rollup across a professor's instances.
///
/// The title lists keep duplicates: a student assigned two instances of the
/// same form sees the title twice in `assigned_titles` and the incomplete
/// list is the multiset difference. [`rollup_titles`] collapses duplicates
/// for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProgress {
  pub user_id:           Uuid,
  pub first_name:        String,
  pub last_name:         String,
  pub total_assigned:    u32,
  pub total_completed:   u32,
  pub percent_complete:  u32,
  pub assigned_titles:   Vec<String>,
  pub completed_titles:  Vec<String>,
  pub incomplete_titles: Vec<String>,
}

/// round(completed / total × 100), with 0 when nothing is assigned.
pub fn percent_complete(completed: u32, total: u32) -> u32 {
  if total == 0 {
    return 0;
  }
  (f64::from(completed) / f64::from(total) * 100.0).round() as u32
}

/// Collapse duplicate titles into `"Title (N)"` display form, preserving
/// first-seen order. Purely presentational; counts are never corrected.
pub fn rollup_titles(titles: &[String]) -> Vec<String> {
  let mut order: Vec<&String> = Vec::new();
  let mut counts: std::collections::HashMap<&String, usize> =
    std::collections::HashMap::new();
  for t in titles {
    let seen = counts.entry(t).or_insert(0);
    if *seen == 0 {
      order.push(t);
    }
    *seen += 1;
  }
  order
    .into_iter()
    .map(|t| match counts[t] {
      1 => t.clone(),
      n => format!("{t} ({n})"),
    })
    .collect()
}

// ─── Per-instance question rollup ────────────────────────────────────────────

/// One question's aggregate over all submitted answers to an instance.
///
/// `average_rating` is the mean of the stored 0-based choice indices, so it
/// lives on a 0..(choices-1) scale. This matches the stored answer values
/// exactly; renderers resolve labels by indexing `choices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRollup {
  pub question_id:    Uuid,
  pub question_text:  String,
  pub kind:           QuestionKind,
  pub max_rating:     Option<u32>,
  pub average_rating: f64,
  pub comments:       Vec<String>,
  pub choices:        Vec<String>,
}

/// The full rollup for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResults {
  pub form_title:   String,
  pub instructions: String,
  pub questions:    Vec<QuestionRollup>,
}

// ─── Single-response detail ──────────────────────────────────────────────────

/// One choice with its selection flag, in choice-list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceFlag {
  pub choice_text: String,
  pub selected:    bool,
}

/// One question of a single response: selection flags for ratings, raw text
/// for short answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDetail {
  pub question_id:   Uuid,
  pub question_text: String,
  pub kind:          QuestionKind,
  pub choices:       Vec<ChoiceFlag>,
  pub text:          Option<String>,
}

/// The detail view of one submitted or draft response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDetail {
  pub response_id: Uuid,
  pub form_title:  String,
  pub answers:     Vec<AnswerDetail>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percent_rounds_half_up() {
    assert_eq!(percent_complete(1, 2), 50);
    assert_eq!(percent_complete(1, 3), 33);
    assert_eq!(percent_complete(2, 3), 67);
    assert_eq!(percent_complete(0, 0), 0);
    assert_eq!(percent_complete(3, 3), 100);
  }

  #[test]
  fn rollup_collapses_duplicates_in_order() {
    let titles: Vec<String> =
      ["Midterm", "Midterm", "Final"].iter().map(|s| s.to_string()).collect();
    assert_eq!(rollup_titles(&titles), vec!["Midterm (2)", "Final"]);
  }

  #[test]
  fn rollup_leaves_unique_titles_untouched() {
    let titles: Vec<String> = vec!["Peer Eval".into()];
    assert_eq!(rollup_titles(&titles), vec!["Peer Eval"]);
    assert!(rollup_titles(&[]).is_empty());
  }
}
