//! Integration tests driving the router end to end over an in-memory store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use peerform_core::{
  store::SurveyStore,
  user::{NewUser, Role, User},
};
use peerform_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, AuthConfig, api_router, auth::issue_token};

const SECRET: &str = "test-secret";

async fn make_state() -> AppState<SqliteStore> {
  AppState {
    store: Arc::new(SqliteStore::open_in_memory().await.unwrap()),
    auth:  Arc::new(AuthConfig { token_secret: SECRET.to_string() }),
  }
}

async fn add_user(state: &AppState<SqliteStore>, role: Role) -> (User, String) {
  let user = state
    .store
    .add_user(NewUser {
      first_name: "Test".into(),
      last_name:  "User".into(),
      email:      format!("{}@example.edu", Uuid::new_v4()),
      role,
    })
    .await
    .unwrap();
  let token = issue_token(SECRET, user.user_id, role);
  (user, token)
}

async fn send(
  state: &AppState<SqliteStore>,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> axum::response::Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let req = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  api_router(state.clone()).oneshot(req).await.unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn sprint_form(title: &str) -> Value {
  json!({
    "title": title,
    "instructions": "Rate your teammate.",
    "questions": [
      { "text": "Collaboration?", "kind": "rating",
        "choices": ["Poor", "OK", "Great"] },
      { "text": "Comments?", "kind": "short_answer" }
    ]
  })
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_token_returns_401() {
  let state = make_state().await;
  let resp = send(&state, "GET", "/forms", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn forged_token_returns_401() {
  let state = make_state().await;
  let token = issue_token("some-other-secret", Uuid::new_v4(), Role::Professor);
  let resp = send(&state, "GET", "/forms", Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn student_cannot_author_forms() {
  let state = make_state().await;
  let (_, token) = add_user(&state, Role::Student).await;
  let resp =
    send(&state, "POST", "/forms", Some(&token), Some(sprint_form("S1"))).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ─── Forms ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_list_and_load_form() {
  let state = make_state().await;
  let (_, token) = add_user(&state, Role::Professor).await;

  let resp =
    send(&state, "POST", "/forms", Some(&token), Some(sprint_form("Sprint 1")))
      .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let saved = json_body(resp).await;
  assert_eq!(saved["updated"], json!(false));
  let form_id = saved["survey_form_id"].as_str().unwrap().to_string();

  let resp = send(&state, "GET", "/forms", Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

  let resp =
    send(&state, "GET", &format!("/forms/{form_id}"), Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let detail = json_body(resp).await;
  assert_eq!(detail["form_title"], json!("Sprint 1"));
  assert_eq!(detail["questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_title_returns_409_then_overwrite_succeeds() {
  let state = make_state().await;
  let (_, token) = add_user(&state, Role::Professor).await;

  send(&state, "POST", "/forms", Some(&token), Some(sprint_form("Sprint 1")))
    .await;
  let resp =
    send(&state, "POST", "/forms", Some(&token), Some(sprint_form("Sprint 1")))
      .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  let mut overwrite = sprint_form("Sprint 1");
  overwrite["force_overwrite"] = json!(true);
  let resp = send(&state, "POST", "/forms", Some(&token), Some(overwrite)).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["updated"], json!(true));
}

#[tokio::test]
async fn malformed_form_returns_400() {
  let state = make_state().await;
  let (_, token) = add_user(&state, Role::Professor).await;

  let bad = json!({
    "title": "Sprint 1",
    "questions": [{ "text": "Effort?", "kind": "rating", "choices": [] }]
  });
  let resp = send(&state, "POST", "/forms", Some(&token), Some(bad)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn mistyped_answers_return_400_with_error_body() {
  let state = make_state().await;
  let (_prof, prof_token) = add_user(&state, Role::Professor).await;
  let (ada, ada_token) = add_user(&state, Role::Student).await;
  let (barbara, _) = add_user(&state, Role::Student).await;

  let resp = send(
    &state,
    "POST",
    "/forms",
    Some(&prof_token),
    Some(sprint_form("Sprint 1")),
  )
  .await;
  let form_id = json_body(resp).await["survey_form_id"]
    .as_str()
    .unwrap()
    .to_string();
  let resp = send(
    &state,
    "POST",
    &format!("/forms/{form_id}/assign"),
    Some(&prof_token),
    Some(json!({
      "deadline": "2026-12-01T00:00:00Z",
      "target": { "kind": "student", "id": ada.user_id }
    })),
  )
  .await;
  let instance_id = json_body(resp).await["instance"]["instance_id"]
    .as_str()
    .unwrap()
    .to_string();

  // `answers` must be a mapping, not a string.
  let resp = send(
    &state,
    "POST",
    &format!("/instances/{instance_id}/draft"),
    Some(&ada_token),
    Some(json!({ "subject": barbara.user_id, "answers": "not-a-mapping" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn peers_list_the_other_students() {
  let state = make_state().await;
  let (_prof, _) = add_user(&state, Role::Professor).await;
  let (_ada, ada_token) = add_user(&state, Role::Student).await;
  let (barbara, _) = add_user(&state, Role::Student).await;

  let resp = send(&state, "GET", "/me/peers", Some(&ada_token), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let peers = json_body(resp).await;
  assert_eq!(peers.as_array().unwrap().len(), 1);
  assert_eq!(peers[0]["user_id"], json!(barbara.user_id.to_string()));
  assert_eq!(peers[0]["name"], json!("Test User"));
}

#[tokio::test]
async fn unknown_user_returns_404() {
  let state = make_state().await;
  let (_, token) = add_user(&state, Role::Professor).await;
  let resp = send(
    &state,
    "GET",
    &format!("/users/{}", Uuid::new_v4()),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Full lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_draft_submit_and_report() {
  let state = make_state().await;
  let (_prof, prof_token) = add_user(&state, Role::Professor).await;
  let (ada, ada_token) = add_user(&state, Role::Student).await;
  let (barbara, _) = add_user(&state, Role::Student).await;

  // Professor authors a form and deploys it to Ada.
  let resp = send(
    &state,
    "POST",
    "/forms",
    Some(&prof_token),
    Some(sprint_form("Sprint 1")),
  )
  .await;
  let form_id = json_body(resp).await["survey_form_id"]
    .as_str()
    .unwrap()
    .to_string();

  let resp = send(
    &state,
    "POST",
    &format!("/forms/{form_id}/assign"),
    Some(&prof_token),
    Some(json!({
      "deadline": "2026-12-01T00:00:00Z",
      "target": { "kind": "student", "id": ada.user_id }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let deployed = json_body(resp).await;
  assert_eq!(deployed["assigned"], json!(1));
  let instance_id = deployed["instance"]["instance_id"]
    .as_str()
    .unwrap()
    .to_string();

  // Ada sees it pending and loads the form to fill in.
  let resp = send(&state, "GET", "/me/pending", Some(&ada_token), None).await;
  let pending = json_body(resp).await;
  assert_eq!(pending.as_array().unwrap().len(), 1);

  let resp = send(
    &state,
    "GET",
    &format!("/instances/{instance_id}/form"),
    Some(&ada_token),
    None,
  )
  .await;
  let detail = json_body(resp).await;
  let questions = detail["questions"].as_array().unwrap();
  let rating_id = questions[0]["question_id"].as_str().unwrap();
  let text_id = questions[1]["question_id"].as_str().unwrap();

  // Draft, then submit with revised answers.
  let resp = send(
    &state,
    "POST",
    &format!("/instances/{instance_id}/draft"),
    Some(&ada_token),
    Some(json!({
      "subject": barbara.user_id,
      "answers": { (rating_id): "1", (text_id): "decent" }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let draft_id = json_body(resp).await["response_id"]
    .as_str()
    .unwrap()
    .to_string();

  // The draft shows up for Ada and its answers read back.
  let resp = send(&state, "GET", "/me/drafts", Some(&ada_token), None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
  let resp = send(
    &state,
    "GET",
    &format!("/drafts/{draft_id}"),
    Some(&ada_token),
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await[text_id], json!("decent"));

  // Nobody else can read it.
  let resp = send(
    &state,
    "GET",
    &format!("/drafts/{draft_id}"),
    Some(&prof_token),
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = send(
    &state,
    "POST",
    &format!("/instances/{instance_id}/submit"),
    Some(&ada_token),
    Some(json!({
      "subject": barbara.user_id,
      "answers": { (rating_id): "2", (text_id): "great teammate" }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let response_id = json_body(resp).await["response_id"]
    .as_str()
    .unwrap()
    .to_string();
  assert_eq!(response_id, draft_id);

  // Pending and drafts are both cleared for Ada.
  let resp = send(&state, "GET", "/me/pending", Some(&ada_token), None).await;
  assert!(json_body(resp).await.as_array().unwrap().is_empty());
  let resp = send(&state, "GET", "/me/drafts", Some(&ada_token), None).await;
  assert!(json_body(resp).await.as_array().unwrap().is_empty());

  // The professor's progress rollup shows Ada fully done.
  let resp = send(&state, "GET", "/progress", Some(&prof_token), None).await;
  let progress = json_body(resp).await;
  assert_eq!(progress.as_array().unwrap().len(), 1);
  assert_eq!(progress[0]["percent_complete"], json!(100));
  assert_eq!(progress[0]["completed_titles"], json!(["Sprint 1"]));

  // Per-question results carry the 0-based average and the comment.
  let resp = send(
    &state,
    "GET",
    &format!("/instances/{instance_id}/results"),
    Some(&prof_token),
    None,
  )
  .await;
  let results = json_body(resp).await;
  assert_eq!(results["questions"][0]["average_rating"], json!(2.0));
  assert_eq!(results["questions"][1]["comments"], json!(["great teammate"]));

  // And the raw response flags the selected choice.
  let resp = send(
    &state,
    "GET",
    &format!("/responses/{response_id}"),
    Some(&prof_token),
    None,
  )
  .await;
  let detail = json_body(resp).await;
  let flags = detail["answers"][0]["choices"].as_array().unwrap();
  assert_eq!(flags[2]["selected"], json!(true));
  assert_eq!(flags[0]["selected"], json!(false));

  // Students cannot reach the reporting surface.
  let resp = send(&state, "GET", "/progress", Some(&ada_token), None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn section_deploy_assigns_enrolled_students() {
  let state = make_state().await;
  let (_prof, prof_token) = add_user(&state, Role::Professor).await;
  let (ada, _) = add_user(&state, Role::Student).await;
  let (barbara, _) = add_user(&state, Role::Student).await;

  let resp = send(
    &state,
    "POST",
    "/sections",
    Some(&prof_token),
    Some(json!({
      "course_name": "Systems Programming",
      "section_num": "001",
      "term": "Fall",
      "year": 2026
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let section_id = json_body(resp).await["section_id"]
    .as_str()
    .unwrap()
    .to_string();

  for student in [&ada, &barbara] {
    let resp = send(
      &state,
      "POST",
      &format!("/sections/{section_id}/enroll"),
      Some(&prof_token),
      Some(json!({ "student_id": student.user_id })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  }

  let resp = send(
    &state,
    "POST",
    "/forms",
    Some(&prof_token),
    Some(sprint_form("Sprint 1")),
  )
  .await;
  let form_id = json_body(resp).await["survey_form_id"]
    .as_str()
    .unwrap()
    .to_string();

  let resp = send(
    &state,
    "POST",
    &format!("/forms/{form_id}/assign"),
    Some(&prof_token),
    Some(json!({
      "deadline": "2026-12-01T00:00:00Z",
      "target": { "kind": "section", "id": section_id }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  assert_eq!(json_body(resp).await["assigned"], json!(2));

  let resp = send(
    &state,
    "GET",
    &format!("/forms/{form_id}/assigned"),
    Some(&prof_token),
    None,
  )
  .await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);

  // Unassign one; the other keeps their obligation.
  let resp = send(
    &state,
    "POST",
    &format!("/forms/{form_id}/unassign"),
    Some(&prof_token),
    Some(json!({ "student_ids": [ada.user_id] })),
  )
  .await;
  assert_eq!(json_body(resp).await["removed"], json!(1));

  let resp = send(
    &state,
    "GET",
    &format!("/forms/{form_id}/assigned"),
    Some(&prof_token),
    None,
  )
  .await;
  let remaining = json_body(resp).await;
  assert_eq!(remaining.as_array().unwrap().len(), 1);
  assert_eq!(
    remaining[0]["user_id"],
    json!(barbara.user_id.to_string())
  );
}
