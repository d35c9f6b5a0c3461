//! The `SurveyStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `peerform-store-sqlite`). The HTTP layer (`peerform-api`) depends on this
//! abstraction, not on any concrete backend.
//!
//! Every multi-statement mutation (form save/delete, instance creation with
//! a student target, draft save, submit, unassign) is atomic per call:
//! implementations commit or roll back the whole operation, so a failure
//! midway leaves prior state unchanged.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  form::{FormDetail, FormSummary, NewForm, SavedForm},
  instance::{InstanceTarget, PendingSurvey, SurveyInstance},
  report::{InstanceResults, ResponseDetail, StudentProgress},
  response::{AnswerMap, CompletedSurvey, DraftSummary},
  user::{NewSection, NewUser, Section, User},
};

/// Abstraction over a peerform storage backend.
pub trait SurveyStore: Send + Sync {
  // ── Roster (enrollment collaborator surface) ──────────────────────────

  /// Create and persist a user with a server-assigned UUID.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  /// Retrieve a user by UUID. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  /// Create and persist a section.
  fn add_section(
    &self,
    input: NewSection,
  ) -> impl Future<Output = Result<Section>> + Send + '_;

  /// Enroll a student in a section. Re-enrolling is a no-op.
  fn enroll(
    &self,
    section_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// All students currently enrolled in a section.
  fn section_students(
    &self,
    section_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  /// Candidate evaluation subjects for a student: every other student,
  /// ordered by last then first name. Not scoped to a section or team;
  /// evaluators pick their teammates from the full student body.
  fn list_peers(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  // ── Form store ────────────────────────────────────────────────────────

  /// Insert a new form, or — when a form with the same (title, creator)
  /// already exists and `force_overwrite` is set — replace its entire
  /// question set in place. Without the flag a duplicate save fails with
  /// [`crate::Error::DuplicateTitle`]. Partial question updates are not
  /// supported: overwrite always fully replaces the set.
  ///
  /// Overwriting a form whose questions already carry submitted answers is
  /// rejected by the referential constraints and surfaces as
  /// [`crate::Error::Store`]; retire such forms by deploying a new one.
  fn save_form(
    &self,
    creator: Uuid,
    input: NewForm,
  ) -> impl Future<Output = Result<SavedForm>> + Send + '_;

  /// All forms, newest first. Deliberately not filtered by creator: any
  /// authenticated caller may list and load any form.
  fn list_forms(&self) -> impl Future<Output = Result<Vec<FormSummary>>> + Send + '_;

  /// A form header plus its ordered questions and choice text lists.
  fn load_form(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<FormDetail>> + Send + '_;

  /// Delete a form, cascading choices → questions → form in one
  /// transaction. The statement order is load-bearing and never reordered.
  /// A form that still has instances (or submitted answers) deployed
  /// against it cannot be deleted; the referential constraints abort the
  /// transaction and the call fails with [`crate::Error::Store`].
  fn delete_form(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Instance allocator ────────────────────────────────────────────────

  /// Deploy a form against a section or an individual student. A student
  /// target also creates the single assignment row, atomically with the
  /// instance. A section target creates only the instance; assignments
  /// come from [`SurveyStore::assign_students`].
  fn create_instance(
    &self,
    form_id: Uuid,
    deadline: DateTime<Utc>,
    target: InstanceTarget,
  ) -> impl Future<Output = Result<SurveyInstance>> + Send + '_;

  // ── Assignment ledger ─────────────────────────────────────────────────

  /// Bulk-assign students to an instance. Already-assigned students are
  /// silently skipped; returns the number of newly created assignments.
  fn assign_students<'a>(
    &'a self,
    instance_id: Uuid,
    student_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<u32>> + Send + 'a;

  /// For each (instance-of-form, student) pair with an incomplete
  /// assignment: delete the draft response (and its answers) and the
  /// assignment row, all inside one transaction. Completed assignments are
  /// silently excluded — a lenient-ignore policy, not a failure. Returns
  /// the number of assignments removed.
  fn unassign<'a>(
    &'a self,
    form_id: Uuid,
    student_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<u32>> + Send + 'a;

  /// Students holding an incomplete assignment to any instance of the
  /// given form; drives the unassign picker.
  fn list_assigned_students(
    &self,
    form_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>>> + Send + '_;

  /// Instances assigned to a student that are neither completed nor
  /// started (no draft): the "available to start" queue.
  fn list_pending(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PendingSurvey>>> + Send + '_;

  // ── Response engine ───────────────────────────────────────────────────

  /// Create or refresh the open draft for a triple: `saved_at` is bumped
  /// and the answer set is fully replaced (delete-all, insert-all). Never
  /// touches assignment completion. Returns the draft's response id.
  fn save_draft(
    &self,
    instance_id: Uuid,
    evaluator: Uuid,
    subject: Uuid,
    answers: AnswerMap,
  ) -> impl Future<Output = Result<Uuid>> + Send + '_;

  /// Submit a response for a triple. An open draft for the same triple is
  /// converted into the submission (old answers dropped, `is_submitted`
  /// set, `submitted_at` stamped); otherwise a new response is inserted
  /// directly as submitted. Afterwards the evaluator's assignment for the
  /// instance is flipped to completed — regardless of subject, so one
  /// submission completes the instance for that evaluator even when
  /// several subjects remain.
  fn submit(
    &self,
    instance_id: Uuid,
    evaluator: Uuid,
    subject: Uuid,
    answers: AnswerMap,
  ) -> impl Future<Output = Result<Uuid>> + Send + '_;

  /// All open drafts of an evaluator, newest saved first.
  fn list_drafts(
    &self,
    evaluator: Uuid,
  ) -> impl Future<Output = Result<Vec<DraftSummary>>> + Send + '_;

  /// The answer map of an open draft. Fails with
  /// [`crate::Error::DraftNotOwned`] when the response exists but is
  /// submitted or belongs to someone other than `requester`.
  fn load_draft_answers(
    &self,
    response_id: Uuid,
    requester: Uuid,
  ) -> impl Future<Output = Result<AnswerMap>> + Send + '_;

  /// The form detail rendered when a student starts or resumes an
  /// instance.
  fn load_instance_form(
    &self,
    instance_id: Uuid,
  ) -> impl Future<Output = Result<FormDetail>> + Send + '_;

  /// Submitted evaluations of `subject`, deduplicated by instance, newest
  /// first — the student's own results listing.
  fn list_completed(
    &self,
    subject: Uuid,
  ) -> impl Future<Output = Result<Vec<CompletedSurvey>>> + Send + '_;

  // ── Aggregation engine ────────────────────────────────────────────────

  /// Per-student completion rollup over instances whose form was created
  /// by `professor_id`, optionally restricted to one section.
  fn course_progress(
    &self,
    professor_id: Uuid,
    section_filter: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<StudentProgress>>> + Send + '_;

  /// Per-question rating averages (0-based scale) and comment lists over
  /// all submitted responses to an instance.
  fn question_results(
    &self,
    instance_id: Uuid,
  ) -> impl Future<Output = Result<InstanceResults>> + Send + '_;

  /// Per-question, per-choice selection flags for a single response.
  fn answer_detail(
    &self,
    response_id: Uuid,
  ) -> impl Future<Output = Result<ResponseDetail>> + Send + '_;
}
