//! SQL schema for the peerform SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL,
    email      TEXT NOT NULL UNIQUE,
    role       TEXT NOT NULL,    -- 'student' | 'professor'
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sections (
    section_id  TEXT PRIMARY KEY,
    course_name TEXT NOT NULL,
    section_num TEXT NOT NULL,
    term        TEXT NOT NULL,
    year        INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    section_id TEXT NOT NULL REFERENCES sections(section_id),
    student_id TEXT NOT NULL REFERENCES users(user_id),
    PRIMARY KEY (section_id, student_id)
);

-- Versionless templates: saving over an existing (title, creator) pair
-- replaces the question set in place.
CREATE TABLE IF NOT EXISTS survey_forms (
    survey_form_id TEXT PRIMARY KEY,
    form_title     TEXT NOT NULL,
    instructions   TEXT NOT NULL DEFAULT '',
    created_by     TEXT NOT NULL REFERENCES users(user_id),
    is_default     INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    UNIQUE (form_title, created_by)
);

CREATE TABLE IF NOT EXISTS survey_questions (
    question_id    TEXT PRIMARY KEY,
    survey_form_id TEXT NOT NULL REFERENCES survey_forms(survey_form_id),
    question_text  TEXT NOT NULL,
    question_type  TEXT NOT NULL,   -- 'text' | 'rating'
    max_rating     INTEGER,         -- choice count for ratings, NULL for text
    position       INTEGER NOT NULL
);

-- A choice's position is its 0-based rating value.
CREATE TABLE IF NOT EXISTS question_choices (
    choice_id   TEXT PRIMARY KEY,
    question_id TEXT NOT NULL REFERENCES survey_questions(question_id),
    choice_text TEXT NOT NULL,
    position    INTEGER NOT NULL
);

-- One deployment of a form. section_id is NULL for individual targets;
-- the student is identified by the single assignment row instead.
CREATE TABLE IF NOT EXISTS survey_instances (
    instance_id    TEXT PRIMARY KEY,
    survey_form_id TEXT NOT NULL REFERENCES survey_forms(survey_form_id),
    section_id     TEXT REFERENCES sections(section_id),
    deadline       TEXT NOT NULL,
    assigned_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS survey_instance_assignments (
    instance_id TEXT NOT NULL REFERENCES survey_instances(instance_id),
    student_id  TEXT NOT NULL REFERENCES users(user_id),
    completed   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (instance_id, student_id)
);

CREATE TABLE IF NOT EXISTS survey_responses (
    response_id    TEXT PRIMARY KEY,
    instance_id    TEXT NOT NULL REFERENCES survey_instances(instance_id),
    survey_form_id TEXT NOT NULL REFERENCES survey_forms(survey_form_id),
    section_id     TEXT,
    submitted_by   TEXT NOT NULL REFERENCES users(user_id),
    evaluated_user TEXT NOT NULL REFERENCES users(user_id),
    is_submitted   INTEGER NOT NULL DEFAULT 0,
    saved_at       TEXT,
    submitted_at   TEXT
);

-- At most one open draft per (instance, evaluator, subject) triple. The
-- partial index makes the draft upsert a conditional insert instead of a
-- racy lookup-then-insert.
CREATE UNIQUE INDEX IF NOT EXISTS responses_open_draft_idx
    ON survey_responses(instance_id, submitted_by, evaluated_user)
    WHERE is_submitted = 0;

CREATE TABLE IF NOT EXISTS survey_answers (
    response_id  TEXT NOT NULL REFERENCES survey_responses(response_id),
    question_id  TEXT NOT NULL REFERENCES survey_questions(question_id),
    answer_value TEXT NOT NULL,
    UNIQUE (response_id, question_id)
);

CREATE INDEX IF NOT EXISTS questions_form_idx     ON survey_questions(survey_form_id);
CREATE INDEX IF NOT EXISTS choices_question_idx   ON question_choices(question_id);
CREATE INDEX IF NOT EXISTS instances_form_idx     ON survey_instances(survey_form_id);
CREATE INDEX IF NOT EXISTS assignments_student_idx ON survey_instance_assignments(student_id);
CREATE INDEX IF NOT EXISTS responses_instance_idx ON survey_responses(instance_id);
CREATE INDEX IF NOT EXISTS responses_evaluator_idx ON survey_responses(submitted_by);
CREATE INDEX IF NOT EXISTS answers_response_idx   ON survey_answers(response_id);

PRAGMA user_version = 1;
";
