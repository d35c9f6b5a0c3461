//! JSON REST API for peerform.
//!
//! Exposes an axum [`Router`] backed by any
//! [`peerform_core::store::SurveyStore`]. Every route requires a bearer
//! token issued by [`auth::issue_token`]; TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", peerform_api::api_router(state))
//! ```

pub mod assignments;
pub mod auth;
pub mod error;
pub mod extract;
pub mod forms;
pub mod responses;
pub mod results;
pub mod roster;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use peerform_core::store::SurveyStore;

pub use auth::{AuthConfig, Identity, issue_token};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), auth: self.auth.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  Router::new()
    // Roster
    .route("/users", post(roster::create_user::<S>))
    .route("/users/{id}", get(roster::get_user::<S>))
    .route("/sections", post(roster::create_section::<S>))
    .route("/sections/{id}/enroll", post(roster::enroll::<S>))
    .route("/sections/{id}/students", get(roster::students::<S>))
    .route("/me/peers", get(roster::peers::<S>))
    // Forms
    .route("/forms", get(forms::list::<S>).post(forms::save::<S>))
    .route("/forms/{id}", get(forms::get_one::<S>).delete(forms::delete_one::<S>))
    // Assignment ledger
    .route("/forms/{id}/assign", post(assignments::deploy::<S>))
    .route("/forms/{id}/unassign", post(assignments::unassign::<S>))
    .route("/forms/{id}/assigned", get(assignments::assigned::<S>))
    .route("/instances/{id}/assign", post(assignments::assign_more::<S>))
    .route("/me/pending", get(assignments::my_pending::<S>))
    // Responses
    .route("/instances/{id}/form", get(responses::instance_form::<S>))
    .route("/instances/{id}/draft", post(responses::save_draft::<S>))
    .route("/instances/{id}/submit", post(responses::submit::<S>))
    .route("/me/drafts", get(responses::my_drafts::<S>))
    .route("/me/completed", get(responses::my_completed::<S>))
    .route("/drafts/{id}", get(responses::draft_answers::<S>))
    // Aggregation
    .route("/progress", get(results::progress::<S>))
    .route("/instances/{id}/results", get(results::instance_results::<S>))
    .route("/responses/{id}", get(results::answer_detail::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
