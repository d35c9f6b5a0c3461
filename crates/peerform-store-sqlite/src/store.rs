//! [`SqliteStore`] — the SQLite implementation of [`SurveyStore`].
//!
//! Every multi-statement mutation runs inside one rusqlite transaction so a
//! failure midway rolls the whole call back. Domain outcomes that have to be
//! decided inside a transaction (duplicate title, missing instance, foreign
//! draft) are carried out of the `call` closure as plain enums and converted
//! to [`peerform_core::Error`] afterwards.

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use peerform_core::{
  Error, Result,
  form::{FormDetail, FormQuestion, FormSummary, NewForm, QuestionKind, SavedForm},
  instance::{InstanceTarget, PendingSurvey, SurveyInstance},
  report::{
    AnswerDetail, ChoiceFlag, InstanceResults, QuestionRollup, ResponseDetail,
    StudentProgress, percent_complete,
  },
  response::{AnswerMap, CompletedSurvey, DraftSummary},
  store::SurveyStore,
  user::{NewSection, NewUser, Section, User},
};

use crate::{
  encode::{
    RawCompleted, RawDraft, RawFormSummary, RawInstance, RawPending, RawUser,
    decode_question_kind, decode_uuid, encode_dt, encode_question_kind,
    encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

fn db_err(e: tokio_rusqlite::Error) -> Error { Error::Store(e.to_string()) }

// ─── Closure outcomes ────────────────────────────────────────────────────────

/// What happened inside the `save_form` transaction.
enum SaveFormOutcome {
  Saved { form_id: String, updated: bool },
  DuplicateTitle,
}

/// What happened inside the `create_instance` transaction.
enum CreateInstanceOutcome {
  Created(RawInstance),
  FormMissing,
  SectionMissing,
  StudentMissing,
}

/// What happened inside the `load_draft_answers` read.
enum DraftLookup {
  Missing,
  NotOwned,
  Answers(Vec<(String, String)>),
}

/// One row of the course-progress join; one row per assigned instance.
struct ProgressRow {
  user_id:        String,
  first_name:     String,
  last_name:      String,
  form_title:     String,
  has_submission: bool,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A peerform survey store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(db_err)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }

  /// Fetch a form's questions and grouped choice lists. Runs inside the
  /// caller's `call` closure so reads stay consistent.
  fn question_rows(
    conn: &rusqlite::Connection,
    form_id: &str,
  ) -> rusqlite::Result<(Vec<(String, String, String, Option<i64>)>, HashMap<String, Vec<String>>)>
  {
    let mut stmt = conn.prepare(
      "SELECT question_id, question_text, question_type, max_rating
       FROM survey_questions
       WHERE survey_form_id = ?1
       ORDER BY position",
    )?;
    let questions = stmt
      .query_map(rusqlite::params![form_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    // Batch-fetch choices for all questions, then group; the ORDER BY keeps
    // each question's choices in position order within its group.
    let mut choices: HashMap<String, Vec<String>> = HashMap::new();
    if !questions.is_empty() {
      let placeholders = questions
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(", ");
      let sql = format!(
        "SELECT question_id, choice_text FROM question_choices
         WHERE question_id IN ({placeholders})
         ORDER BY position"
      );
      let mut stmt = conn.prepare(&sql)?;
      let rows = stmt
        .query_map(
          rusqlite::params_from_iter(questions.iter().map(|q| q.0.clone())),
          |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      for (qid, text) in rows {
        choices.entry(qid).or_default().push(text);
      }
    }

    Ok((questions, choices))
  }

  fn assemble_questions(
    questions: Vec<(String, String, String, Option<i64>)>,
    mut choices: HashMap<String, Vec<String>>,
  ) -> Result<Vec<FormQuestion>> {
    questions
      .into_iter()
      .map(|(qid, text, kind, max_rating)| {
        let choice_list = choices.remove(&qid).unwrap_or_default();
        Ok(FormQuestion {
          question_id:   decode_uuid(&qid)?,
          question_text: text,
          kind:          decode_question_kind(&kind)?,
          max_rating:    max_rating.map(|m| m as u32),
          choices:       choice_list,
        })
      })
      .collect()
  }
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  // ── Roster ────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      first_name: input.first_name,
      last_name:  input.last_name,
      email:      input.email,
      role:       input.role,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let at_str   = encode_dt(user.created_at);
    let role_str = encode_role(user.role).to_owned();
    let (first, last, email) =
      (user.first_name.clone(), user.last_name.clone(), user.email.clone());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, first_name, last_name, email, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, first, last, email, role_str, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, first_name, last_name, email, role, created_at
               FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawUser {
                  user_id:    row.get(0)?,
                  first_name: row.get(1)?,
                  last_name:  row.get(2)?,
                  email:      row.get(3)?,
                  role:       row.get(4)?,
                  created_at: row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(db_err)?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn add_section(&self, input: NewSection) -> Result<Section> {
    let section = Section {
      section_id:  Uuid::new_v4(),
      course_name: input.course_name,
      section_num: input.section_num,
      term:        input.term,
      year:        input.year,
      created_at:  Utc::now(),
    };

    let id_str = encode_uuid(section.section_id);
    let at_str = encode_dt(section.created_at);
    let (course, num, term, year) = (
      section.course_name.clone(),
      section.section_num.clone(),
      section.term.clone(),
      section.year,
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sections (section_id, course_name, section_num, term, year, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, course, num, term, year, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(db_err)?;

    Ok(section)
  }

  async fn enroll(&self, section_id: Uuid, student_id: Uuid) -> Result<()> {
    let section_str = encode_uuid(section_id);
    let student_str = encode_uuid(student_id);

    let (section_ok, student_ok): (bool, bool) = self
      .conn
      .call(move |conn| {
        let section_ok: bool = conn
          .query_row(
            "SELECT 1 FROM sections WHERE section_id = ?1",
            rusqlite::params![section_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        let student_ok: bool = conn
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![student_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if section_ok && student_ok {
          conn.execute(
            "INSERT OR IGNORE INTO enrollments (section_id, student_id) VALUES (?1, ?2)",
            rusqlite::params![section_str, student_str],
          )?;
        }
        Ok((section_ok, student_ok))
      })
      .await
      .map_err(db_err)?;

    if !section_ok {
      return Err(Error::SectionNotFound(section_id));
    }
    if !student_ok {
      return Err(Error::UserNotFound(student_id));
    }
    Ok(())
  }

  async fn section_students(&self, section_id: Uuid) -> Result<Vec<User>> {
    let section_str = encode_uuid(section_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.first_name, u.last_name, u.email, u.role, u.created_at
           FROM enrollments e
           JOIN users u ON u.user_id = e.student_id
           WHERE e.section_id = ?1
           ORDER BY u.last_name, u.first_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![section_str], |row| {
            Ok(RawUser {
              user_id:    row.get(0)?,
              first_name: row.get(1)?,
              last_name:  row.get(2)?,
              email:      row.get(3)?,
              role:       row.get(4)?,
              created_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_peers(&self, student_id: Uuid) -> Result<Vec<User>> {
    let caller_str = encode_uuid(student_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, first_name, last_name, email, role, created_at
           FROM users
           WHERE role = 'student' AND user_id != ?1
           ORDER BY last_name, first_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![caller_str], |row| {
            Ok(RawUser {
              user_id:    row.get(0)?,
              first_name: row.get(1)?,
              last_name:  row.get(2)?,
              email:      row.get(3)?,
              role:       row.get(4)?,
              created_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Form store ────────────────────────────────────────────────────────────

  async fn save_form(&self, creator: Uuid, input: NewForm) -> Result<SavedForm> {
    input.validate()?;

    let creator_str = encode_uuid(creator);
    let now_str     = encode_dt(Utc::now());
    let title       = input.title.clone();
    let outcome: SaveFormOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
          .query_row(
            "SELECT survey_form_id FROM survey_forms
             WHERE form_title = ?1 AND created_by = ?2",
            rusqlite::params![input.title, creator_str],
            |row| row.get(0),
          )
          .optional()?;

        let (form_id, updated) = match existing {
          Some(id) => {
            if !input.force_overwrite {
              return Ok(SaveFormOutcome::DuplicateTitle);
            }
            // Overwrite fully replaces the question set: choices first,
            // then questions, then the header update.
            tx.execute(
              "DELETE FROM question_choices WHERE question_id IN (
                 SELECT question_id FROM survey_questions WHERE survey_form_id = ?1
               )",
              rusqlite::params![id],
            )?;
            tx.execute(
              "DELETE FROM survey_questions WHERE survey_form_id = ?1",
              rusqlite::params![id],
            )?;
            tx.execute(
              "UPDATE survey_forms SET form_title = ?1, instructions = ?2
               WHERE survey_form_id = ?3",
              rusqlite::params![input.title, input.instructions, id],
            )?;
            (id, true)
          }
          None => {
            let id = encode_uuid(Uuid::new_v4());
            tx.execute(
              "INSERT INTO survey_forms
                 (survey_form_id, form_title, instructions, created_by, is_default, created_at)
               VALUES (?1, ?2, ?3, ?4, 0, ?5)",
              rusqlite::params![id, input.title, input.instructions, creator_str, now_str],
            )?;
            (id, false)
          }
        };

        for (position, q) in input.questions.iter().enumerate() {
          let question_id = encode_uuid(Uuid::new_v4());
          let kind_str    = encode_question_kind(q.kind);
          let max_rating  = match q.kind {
            QuestionKind::Rating => Some(q.choices.len() as i64),
            QuestionKind::ShortAnswer => None,
          };
          tx.execute(
            "INSERT INTO survey_questions
               (question_id, survey_form_id, question_text, question_type, max_rating, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              question_id,
              form_id,
              q.text,
              kind_str,
              max_rating,
              position as i64,
            ],
          )?;
          for (choice_pos, choice_text) in q.choices.iter().enumerate() {
            tx.execute(
              "INSERT INTO question_choices (choice_id, question_id, choice_text, position)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![
                encode_uuid(Uuid::new_v4()),
                question_id,
                choice_text,
                choice_pos as i64,
              ],
            )?;
          }
        }

        tx.commit()?;
        Ok(SaveFormOutcome::Saved { form_id, updated })
      })
      .await
      .map_err(db_err)?;

    match outcome {
      SaveFormOutcome::Saved { form_id, updated } => Ok(SavedForm {
        survey_form_id: decode_uuid(&form_id)?,
        updated,
      }),
      SaveFormOutcome::DuplicateTitle => Err(Error::DuplicateTitle(title)),
    }
  }

  async fn list_forms(&self) -> Result<Vec<FormSummary>> {
    let raws: Vec<RawFormSummary> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT survey_form_id, form_title, is_default, created_by, created_at
           FROM survey_forms
           ORDER BY created_at DESC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawFormSummary {
              survey_form_id: row.get(0)?,
              form_title:     row.get(1)?,
              is_default:     row.get(2)?,
              created_by:     row.get(3)?,
              created_at:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawFormSummary::into_summary).collect()
  }

  async fn load_form(&self, id: Uuid) -> Result<FormDetail> {
    let id_str = encode_uuid(id);

    type Header = (String, String, String);
    let raw: Option<(Header, Vec<(String, String, String, Option<i64>)>, HashMap<String, Vec<String>>)> =
      self
        .conn
        .call(move |conn| {
          let header: Option<Header> = conn
            .query_row(
              "SELECT survey_form_id, form_title, instructions
               FROM survey_forms WHERE survey_form_id = ?1",
              rusqlite::params![id_str],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
          let Some(header) = header else { return Ok(None) };

          let (questions, choices) = Self::question_rows(conn, &header.0)?;
          Ok(Some((header, questions, choices)))
        })
        .await
        .map_err(db_err)?;

    let Some(((form_id, title, instructions), questions, choices)) = raw else {
      return Err(Error::FormNotFound(id));
    };

    Ok(FormDetail {
      survey_form_id: decode_uuid(&form_id)?,
      form_title:     title,
      instructions,
      questions:      Self::assemble_questions(questions, choices)?,
    })
  }

  async fn delete_form(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let existed: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Explicit ordered cascade: choices, then questions, then the form.
        tx.execute(
          "DELETE FROM question_choices WHERE question_id IN (
             SELECT question_id FROM survey_questions WHERE survey_form_id = ?1
           )",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM survey_questions WHERE survey_form_id = ?1",
          rusqlite::params![id_str],
        )?;
        let deleted = tx.execute(
          "DELETE FROM survey_forms WHERE survey_form_id = ?1",
          rusqlite::params![id_str],
        )?;

        tx.commit()?;
        Ok(deleted > 0)
      })
      .await
      .map_err(db_err)?;

    if !existed {
      return Err(Error::FormNotFound(id));
    }
    Ok(())
  }

  // ── Instance allocator ────────────────────────────────────────────────────

  async fn create_instance(
    &self,
    form_id: Uuid,
    deadline: chrono::DateTime<Utc>,
    target: InstanceTarget,
  ) -> Result<SurveyInstance> {
    let form_str     = encode_uuid(form_id);
    let instance_str = encode_uuid(Uuid::new_v4());
    let deadline_str = encode_dt(deadline);
    let now_str      = encode_dt(Utc::now());

    let outcome: CreateInstanceOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let form_ok: bool = tx
          .query_row(
            "SELECT 1 FROM survey_forms WHERE survey_form_id = ?1",
            rusqlite::params![form_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !form_ok {
          return Ok(CreateInstanceOutcome::FormMissing);
        }

        let section_str = match target {
          InstanceTarget::Section(section_id) => {
            let section_str = encode_uuid(section_id);
            let ok: bool = tx
              .query_row(
                "SELECT 1 FROM sections WHERE section_id = ?1",
                rusqlite::params![section_str],
                |_| Ok(true),
              )
              .optional()?
              .unwrap_or(false);
            if !ok {
              return Ok(CreateInstanceOutcome::SectionMissing);
            }
            Some(section_str)
          }
          InstanceTarget::Student(student_id) => {
            let student_str = encode_uuid(student_id);
            let ok: bool = tx
              .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                rusqlite::params![student_str],
                |_| Ok(true),
              )
              .optional()?
              .unwrap_or(false);
            if !ok {
              return Ok(CreateInstanceOutcome::StudentMissing);
            }
            None
          }
        };

        tx.execute(
          "INSERT INTO survey_instances
             (instance_id, survey_form_id, section_id, deadline, assigned_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![instance_str, form_str, section_str, deadline_str, now_str],
        )?;

        // An individual target carries its one assignment with it.
        if let InstanceTarget::Student(student_id) = target {
          tx.execute(
            "INSERT INTO survey_instance_assignments (instance_id, student_id, completed)
             VALUES (?1, ?2, 0)",
            rusqlite::params![instance_str, encode_uuid(student_id)],
          )?;
        }

        tx.commit()?;
        Ok(CreateInstanceOutcome::Created(RawInstance {
          instance_id:    instance_str,
          survey_form_id: form_str,
          section_id:     section_str,
          deadline:       deadline_str,
          assigned_at:    now_str,
        }))
      })
      .await
      .map_err(db_err)?;

    match outcome {
      CreateInstanceOutcome::Created(raw) => raw.into_instance(),
      CreateInstanceOutcome::FormMissing => Err(Error::FormNotFound(form_id)),
      CreateInstanceOutcome::SectionMissing => match target {
        InstanceTarget::Section(id) => Err(Error::SectionNotFound(id)),
        InstanceTarget::Student(id) => Err(Error::UserNotFound(id)),
      },
      CreateInstanceOutcome::StudentMissing => match target {
        InstanceTarget::Student(id) => Err(Error::UserNotFound(id)),
        InstanceTarget::Section(id) => Err(Error::SectionNotFound(id)),
      },
    }
  }

  // ── Assignment ledger ─────────────────────────────────────────────────────

  async fn assign_students(
    &self,
    instance_id: Uuid,
    student_ids: &[Uuid],
  ) -> Result<u32> {
    let instance_str = encode_uuid(instance_id);
    let student_strs: Vec<String> =
      student_ids.iter().copied().map(encode_uuid).collect();

    let created: Option<u32> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let instance_ok: bool = tx
          .query_row(
            "SELECT 1 FROM survey_instances WHERE instance_id = ?1",
            rusqlite::params![instance_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !instance_ok {
          return Ok(None);
        }

        let mut created = 0u32;
        for student in &student_strs {
          created += tx.execute(
            "INSERT OR IGNORE INTO survey_instance_assignments
               (instance_id, student_id, completed)
             VALUES (?1, ?2, 0)",
            rusqlite::params![instance_str, student],
          )? as u32;
        }

        tx.commit()?;
        Ok(Some(created))
      })
      .await
      .map_err(db_err)?;

    created.ok_or(Error::InstanceNotFound(instance_id))
  }

  async fn unassign(&self, form_id: Uuid, student_ids: &[Uuid]) -> Result<u32> {
    let form_str = encode_uuid(form_id);
    let student_strs: Vec<String> =
      student_ids.iter().copied().map(encode_uuid).collect();

    let removed: u32 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let instance_ids: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT instance_id FROM survey_instances WHERE survey_form_id = ?1",
          )?;
          stmt
            .query_map(rusqlite::params![form_str], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut removed = 0u32;
        for student in &student_strs {
          for instance in &instance_ids {
            // Completed assignments are silently excluded.
            let incomplete: bool = tx
              .query_row(
                "SELECT 1 FROM survey_instance_assignments
                 WHERE instance_id = ?1 AND student_id = ?2 AND completed = 0",
                rusqlite::params![instance, student],
                |_| Ok(true),
              )
              .optional()?
              .unwrap_or(false);
            if !incomplete {
              continue;
            }

            // Drop the evaluator's draft (answers first), then the
            // assignment row itself — one transaction for the whole call.
            tx.execute(
              "DELETE FROM survey_answers WHERE response_id IN (
                 SELECT response_id FROM survey_responses
                 WHERE instance_id = ?1 AND submitted_by = ?2 AND is_submitted = 0
               )",
              rusqlite::params![instance, student],
            )?;
            tx.execute(
              "DELETE FROM survey_responses
               WHERE instance_id = ?1 AND submitted_by = ?2 AND is_submitted = 0",
              rusqlite::params![instance, student],
            )?;
            removed += tx.execute(
              "DELETE FROM survey_instance_assignments
               WHERE instance_id = ?1 AND student_id = ?2 AND completed = 0",
              rusqlite::params![instance, student],
            )? as u32;
          }
        }

        tx.commit()?;
        Ok(removed)
      })
      .await
      .map_err(db_err)?;

    Ok(removed)
  }

  async fn list_assigned_students(&self, form_id: Uuid) -> Result<Vec<User>> {
    let form_str = encode_uuid(form_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT u.user_id, u.first_name, u.last_name, u.email, u.role, u.created_at
           FROM survey_instance_assignments a
           JOIN survey_instances si ON si.instance_id = a.instance_id
           JOIN users u ON u.user_id = a.student_id
           WHERE si.survey_form_id = ?1 AND a.completed = 0
           ORDER BY u.last_name, u.first_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![form_str], |row| {
            Ok(RawUser {
              user_id:    row.get(0)?,
              first_name: row.get(1)?,
              last_name:  row.get(2)?,
              email:      row.get(3)?,
              role:       row.get(4)?,
              created_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_pending(&self, student_id: Uuid) -> Result<Vec<PendingSurvey>> {
    let student_str = encode_uuid(student_id);

    let raws: Vec<RawPending> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT si.instance_id, sf.survey_form_id, sf.form_title,
                  si.section_id, si.deadline, si.assigned_at,
                  u.first_name || ' ' || u.last_name AS professor_name
           FROM survey_instance_assignments sia
           JOIN survey_instances si ON sia.instance_id = si.instance_id
           JOIN survey_forms sf ON si.survey_form_id = sf.survey_form_id
           LEFT JOIN users u ON sf.created_by = u.user_id
           WHERE sia.student_id = ?1
             AND sia.completed = 0
             AND NOT EXISTS (
               SELECT 1 FROM survey_responses r
               WHERE r.submitted_by = sia.student_id
                 AND r.instance_id = sia.instance_id
                 AND r.is_submitted = 0
             )
           ORDER BY si.assigned_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![student_str], |row| {
            Ok(RawPending {
              instance_id:    row.get(0)?,
              survey_form_id: row.get(1)?,
              form_title:     row.get(2)?,
              section_id:     row.get(3)?,
              deadline:       row.get(4)?,
              assigned_at:    row.get(5)?,
              professor_name: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawPending::into_pending).collect()
  }

  // ── Response engine ───────────────────────────────────────────────────────

  async fn save_draft(
    &self,
    instance_id: Uuid,
    evaluator: Uuid,
    subject: Uuid,
    answers: AnswerMap,
  ) -> Result<Uuid> {
    let instance_str  = encode_uuid(instance_id);
    let evaluator_str = encode_uuid(evaluator);
    let subject_str   = encode_uuid(subject);
    let now_str       = encode_dt(Utc::now());
    let new_id_str    = encode_uuid(Uuid::new_v4());
    let answer_rows: Vec<(String, String)> = answers
      .into_iter()
      .map(|(qid, val)| (encode_uuid(qid), val))
      .collect();

    let response_id: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let instance: Option<(String, Option<String>)> = tx
          .query_row(
            "SELECT survey_form_id, section_id FROM survey_instances
             WHERE instance_id = ?1",
            rusqlite::params![instance_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((form_str, section_str)) = instance else {
          return Ok(None);
        };

        // Conditional upsert against the partial draft index: either this
        // inserts the triple's one open draft or refreshes its saved_at.
        tx.execute(
          "INSERT INTO survey_responses
             (response_id, instance_id, survey_form_id, section_id,
              submitted_by, evaluated_user, is_submitted, saved_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
           ON CONFLICT (instance_id, submitted_by, evaluated_user)
             WHERE is_submitted = 0
           DO UPDATE SET saved_at = excluded.saved_at",
          rusqlite::params![
            new_id_str,
            instance_str,
            form_str,
            section_str,
            evaluator_str,
            subject_str,
            now_str,
          ],
        )?;
        let response_id: String = tx.query_row(
          "SELECT response_id FROM survey_responses
           WHERE instance_id = ?1 AND submitted_by = ?2
             AND evaluated_user = ?3 AND is_submitted = 0",
          rusqlite::params![instance_str, evaluator_str, subject_str],
          |row| row.get(0),
        )?;

        // Full replacement of the answer set; no partial diffing.
        tx.execute(
          "DELETE FROM survey_answers WHERE response_id = ?1",
          rusqlite::params![response_id],
        )?;
        for (question, value) in &answer_rows {
          tx.execute(
            "INSERT INTO survey_answers (response_id, question_id, answer_value)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![response_id, question, value],
          )?;
        }

        tx.commit()?;
        Ok(Some(response_id))
      })
      .await
      .map_err(db_err)?;

    match response_id {
      Some(id) => decode_uuid(&id),
      None => Err(Error::InstanceNotFound(instance_id)),
    }
  }

  async fn submit(
    &self,
    instance_id: Uuid,
    evaluator: Uuid,
    subject: Uuid,
    answers: AnswerMap,
  ) -> Result<Uuid> {
    let instance_str  = encode_uuid(instance_id);
    let evaluator_str = encode_uuid(evaluator);
    let subject_str   = encode_uuid(subject);
    let now_str       = encode_dt(Utc::now());
    let new_id_str    = encode_uuid(Uuid::new_v4());
    let answer_rows: Vec<(String, String)> = answers
      .into_iter()
      .map(|(qid, val)| (encode_uuid(qid), val))
      .collect();

    let response_id: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let instance: Option<(String, Option<String>)> = tx
          .query_row(
            "SELECT survey_form_id, section_id FROM survey_instances
             WHERE instance_id = ?1",
            rusqlite::params![instance_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((form_str, section_str)) = instance else {
          return Ok(None);
        };

        let draft: Option<String> = tx
          .query_row(
            "SELECT response_id FROM survey_responses
             WHERE instance_id = ?1 AND submitted_by = ?2
               AND evaluated_user = ?3 AND is_submitted = 0",
            rusqlite::params![instance_str, evaluator_str, subject_str],
            |row| row.get(0),
          )
          .optional()?;

        let response_id = match draft {
          // A draft for the triple is converted into the submission.
          Some(id) => {
            tx.execute(
              "DELETE FROM survey_answers WHERE response_id = ?1",
              rusqlite::params![id],
            )?;
            tx.execute(
              "UPDATE survey_responses
               SET is_submitted = 1, submitted_at = ?2
               WHERE response_id = ?1",
              rusqlite::params![id, now_str],
            )?;
            id
          }
          None => {
            tx.execute(
              "INSERT INTO survey_responses
                 (response_id, instance_id, survey_form_id, section_id,
                  submitted_by, evaluated_user, is_submitted, submitted_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
              rusqlite::params![
                new_id_str,
                instance_str,
                form_str,
                section_str,
                evaluator_str,
                subject_str,
                now_str,
              ],
            )?;
            new_id_str.clone()
          }
        };

        for (question, value) in &answer_rows {
          tx.execute(
            "INSERT INTO survey_answers (response_id, question_id, answer_value)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![response_id, question, value],
          )?;
        }

        // Completion is tracked per evaluator and instance, not per
        // subject: one submission completes the instance for the evaluator.
        tx.execute(
          "UPDATE survey_instance_assignments SET completed = 1
           WHERE instance_id = ?1 AND student_id = ?2",
          rusqlite::params![instance_str, evaluator_str],
        )?;

        tx.commit()?;
        Ok(Some(response_id))
      })
      .await
      .map_err(db_err)?;

    match response_id {
      Some(id) => decode_uuid(&id),
      None => Err(Error::InstanceNotFound(instance_id)),
    }
  }

  async fn list_drafts(&self, evaluator: Uuid) -> Result<Vec<DraftSummary>> {
    let evaluator_str = encode_uuid(evaluator);

    let raws: Vec<RawDraft> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.response_id, r.instance_id, r.survey_form_id,
                  sf.form_title, r.saved_at, si.deadline,
                  u.first_name || ' ' || u.last_name AS professor_name
           FROM survey_responses r
           JOIN survey_forms sf ON r.survey_form_id = sf.survey_form_id
           JOIN survey_instances si ON r.instance_id = si.instance_id
           LEFT JOIN users u ON sf.created_by = u.user_id
           WHERE r.submitted_by = ?1 AND r.is_submitted = 0
           ORDER BY r.saved_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![evaluator_str], |row| {
            Ok(RawDraft {
              response_id:    row.get(0)?,
              instance_id:    row.get(1)?,
              survey_form_id: row.get(2)?,
              form_title:     row.get(3)?,
              saved_at:       row.get(4)?,
              deadline:       row.get(5)?,
              professor_name: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawDraft::into_draft).collect()
  }

  async fn load_draft_answers(
    &self,
    response_id: Uuid,
    requester: Uuid,
  ) -> Result<AnswerMap> {
    let response_str  = encode_uuid(response_id);
    let requester_str = encode_uuid(requester);

    let lookup: DraftLookup = self
      .conn
      .call(move |conn| {
        let row: Option<(String, bool)> = conn
          .query_row(
            "SELECT submitted_by, is_submitted FROM survey_responses
             WHERE response_id = ?1",
            rusqlite::params![response_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((owner, is_submitted)) = row else {
          return Ok(DraftLookup::Missing);
        };
        if owner != requester_str || is_submitted {
          return Ok(DraftLookup::NotOwned);
        }

        let mut stmt = conn.prepare(
          "SELECT question_id, answer_value FROM survey_answers
           WHERE response_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![response_str], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(DraftLookup::Answers(rows))
      })
      .await
      .map_err(db_err)?;

    match lookup {
      DraftLookup::Missing => Err(Error::ResponseNotFound(response_id)),
      DraftLookup::NotOwned => Err(Error::DraftNotOwned(response_id)),
      DraftLookup::Answers(rows) => rows
        .into_iter()
        .map(|(qid, val)| Ok((decode_uuid(&qid)?, val)))
        .collect(),
    }
  }

  async fn load_instance_form(&self, instance_id: Uuid) -> Result<FormDetail> {
    let instance_str = encode_uuid(instance_id);

    let form_str: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT survey_form_id FROM survey_instances WHERE instance_id = ?1",
              rusqlite::params![instance_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(db_err)?;

    let Some(form_str) = form_str else {
      return Err(Error::InstanceNotFound(instance_id));
    };
    self.load_form(decode_uuid(&form_str)?).await
  }

  async fn list_completed(&self, subject: Uuid) -> Result<Vec<CompletedSurvey>> {
    let subject_str = encode_uuid(subject);

    let raws: Vec<RawCompleted> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.instance_id, sf.form_title, MAX(r.submitted_at) AS submitted_at
           FROM survey_responses r
           JOIN survey_forms sf ON r.survey_form_id = sf.survey_form_id
           WHERE r.evaluated_user = ?1 AND r.is_submitted = 1
           GROUP BY r.instance_id, sf.form_title
           ORDER BY submitted_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str], |row| {
            Ok(RawCompleted {
              instance_id:  row.get(0)?,
              form_title:   row.get(1)?,
              submitted_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    raws.into_iter().map(RawCompleted::into_completed).collect()
  }

  // ── Aggregation engine ────────────────────────────────────────────────────

  async fn course_progress(
    &self,
    professor_id: Uuid,
    section_filter: Option<Uuid>,
  ) -> Result<Vec<StudentProgress>> {
    let professor_str = encode_uuid(professor_id);
    let section_str   = section_filter.map(encode_uuid);

    let rows: Vec<ProgressRow> = self
      .conn
      .call(move |conn| {
        let base = "SELECT u.user_id, u.first_name, u.last_name, sf.form_title,
                  EXISTS (
                    SELECT 1 FROM survey_responses r
                    WHERE r.instance_id = si.instance_id
                      AND r.submitted_by = u.user_id
                      AND r.is_submitted = 1
                  ) AS has_submission
           FROM survey_instance_assignments a
           JOIN survey_instances si ON si.instance_id = a.instance_id
           JOIN survey_forms sf ON sf.survey_form_id = si.survey_form_id
           JOIN users u ON u.user_id = a.student_id
           WHERE sf.created_by = ?1";
        let order = "ORDER BY u.last_name, u.first_name, si.assigned_at";

        let map_row = |row: &rusqlite::Row<'_>| {
          Ok(ProgressRow {
            user_id:        row.get(0)?,
            first_name:     row.get(1)?,
            last_name:      row.get(2)?,
            form_title:     row.get(3)?,
            has_submission: row.get(4)?,
          })
        };

        let rows = if let Some(section) = section_str {
          let sql = format!("{base} AND si.section_id = ?2 {order}");
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![professor_str, section], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let sql = format!("{base} {order}");
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![professor_str], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await
      .map_err(db_err)?;

    // Fold per student, preserving the query's name ordering. One row per
    // assigned instance, so counting flagged rows deduplicates completions
    // by instance for free.
    struct Acc {
      user_id:    String,
      first_name: String,
      last_name:  String,
      assigned:   Vec<String>,
      completed:  Vec<String>,
    }
    let mut students: Vec<Acc> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
      let i = *index.entry(row.user_id.clone()).or_insert_with(|| {
        students.push(Acc {
          user_id:    row.user_id.clone(),
          first_name: row.first_name.clone(),
          last_name:  row.last_name.clone(),
          assigned:   Vec::new(),
          completed:  Vec::new(),
        });
        students.len() - 1
      });
      students[i].assigned.push(row.form_title.clone());
      if row.has_submission {
        students[i].completed.push(row.form_title);
      }
    }

    students
      .into_iter()
      .map(|acc| {
        let Acc { user_id, first_name, last_name, assigned, completed } = acc;

        // Multiset difference: remove one assigned occurrence per
        // completed title.
        let mut incomplete = assigned.clone();
        for title in &completed {
          if let Some(pos) = incomplete.iter().position(|t| t == title) {
            incomplete.remove(pos);
          }
        }

        let total_assigned = assigned.len() as u32;
        let total_completed = completed.len() as u32;
        Ok(StudentProgress {
          user_id: decode_uuid(&user_id)?,
          first_name,
          last_name,
          total_assigned,
          total_completed,
          percent_complete: percent_complete(total_completed, total_assigned),
          assigned_titles: assigned,
          completed_titles: completed,
          incomplete_titles: incomplete,
        })
      })
      .collect()
  }

  async fn question_results(&self, instance_id: Uuid) -> Result<InstanceResults> {
    let instance_str = encode_uuid(instance_id);

    type AnswerRow = (String, String, String);
    let raw: Option<(
      (String, String),
      Vec<(String, String, String, Option<i64>)>,
      HashMap<String, Vec<String>>,
      Vec<AnswerRow>,
    )> = self
      .conn
      .call(move |conn| {
        let header: Option<(String, String, String)> = conn
          .query_row(
            "SELECT sf.survey_form_id, sf.form_title, sf.instructions
             FROM survey_instances si
             JOIN survey_forms sf ON si.survey_form_id = sf.survey_form_id
             WHERE si.instance_id = ?1",
            rusqlite::params![instance_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;
        let Some((form_str, title, instructions)) = header else {
          return Ok(None);
        };

        let (questions, choices) = Self::question_rows(conn, &form_str)?;

        // Submitted answers only, in join order.
        let mut stmt = conn.prepare(
          "SELECT sa.question_id, q.question_type, sa.answer_value
           FROM survey_answers sa
           JOIN survey_responses sr ON sa.response_id = sr.response_id
           JOIN survey_questions q ON sa.question_id = q.question_id
           WHERE sr.instance_id = ?1 AND sr.is_submitted = 1",
        )?;
        let answers = stmt
          .query_map(rusqlite::params![instance_str], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(((title, instructions), questions, choices, answers)))
      })
      .await
      .map_err(db_err)?;

    let Some(((form_title, instructions), questions, mut choices, answers)) = raw
    else {
      return Err(Error::InstanceNotFound(instance_id));
    };

    let mut rating_sums: HashMap<String, (f64, u32)> = HashMap::new();
    let mut comments: HashMap<String, Vec<String>> = HashMap::new();
    for (qid, qtype, value) in answers {
      match qtype.as_str() {
        // Answer values are 0-based choice indices; the mean stays on the
        // 0..(choices-1) scale.
        "rating" => {
          if let Ok(v) = value.parse::<i64>() {
            let entry = rating_sums.entry(qid).or_insert((0.0, 0));
            entry.0 += v as f64;
            entry.1 += 1;
          }
        }
        _ => comments.entry(qid).or_default().push(value),
      }
    }

    let rollups = questions
      .into_iter()
      .map(|(qid, text, kind, max_rating)| {
        let average_rating = rating_sums
          .get(&qid)
          .map(|(sum, count)| sum / f64::from(*count))
          .unwrap_or(0.0);
        Ok(QuestionRollup {
          question_id:    decode_uuid(&qid)?,
          question_text:  text,
          kind:           decode_question_kind(&kind)?,
          max_rating:     max_rating.map(|m| m as u32),
          average_rating,
          comments:       comments.remove(&qid).unwrap_or_default(),
          choices:        choices.remove(&qid).unwrap_or_default(),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(InstanceResults { form_title, instructions, questions: rollups })
  }

  async fn answer_detail(&self, response_id: Uuid) -> Result<ResponseDetail> {
    let response_str = encode_uuid(response_id);

    let raw: Option<(
      String,
      Vec<(String, String, String, Option<i64>)>,
      HashMap<String, Vec<String>>,
      Vec<(String, String)>,
    )> = self
      .conn
      .call(move |conn| {
        let header: Option<(String, String)> = conn
          .query_row(
            "SELECT r.survey_form_id, sf.form_title
             FROM survey_responses r
             JOIN survey_forms sf ON r.survey_form_id = sf.survey_form_id
             WHERE r.response_id = ?1",
            rusqlite::params![response_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let Some((form_str, title)) = header else { return Ok(None) };

        let (questions, choices) = Self::question_rows(conn, &form_str)?;

        let mut stmt = conn.prepare(
          "SELECT question_id, answer_value FROM survey_answers
           WHERE response_id = ?1",
        )?;
        let answers = stmt
          .query_map(rusqlite::params![response_str], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((title, questions, choices, answers)))
      })
      .await
      .map_err(db_err)?;

    let Some((form_title, questions, mut choices, answers)) = raw else {
      return Err(Error::ResponseNotFound(response_id));
    };
    let answer_map: HashMap<String, String> = answers.into_iter().collect();

    let details = questions
      .into_iter()
      .map(|(qid, text, kind_str, _max_rating)| {
        let kind = decode_question_kind(&kind_str)?;
        let value = answer_map.get(&qid);
        let (flags, text_value) = match kind {
          QuestionKind::Rating => {
            // The stored value is the 0-based position of the selected
            // choice; flag the matching row.
            let selected = value.and_then(|v| v.parse::<usize>().ok());
            let flags = choices
              .remove(&qid)
              .unwrap_or_default()
              .into_iter()
              .enumerate()
              .map(|(position, choice_text)| ChoiceFlag {
                choice_text,
                selected: selected == Some(position),
              })
              .collect();
            (flags, None)
          }
          QuestionKind::ShortAnswer => (Vec::new(), value.cloned()),
        };
        Ok(AnswerDetail {
          question_id:   decode_uuid(&qid)?,
          question_text: text,
          kind,
          choices:       flags,
          text:          text_value,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(ResponseDetail { response_id, form_title, answers: details })
  }
}
