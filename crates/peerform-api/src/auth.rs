//! Bearer-token extractor and token issuance.
//!
//! Tokens are self-contained: `base64("<user_id>:<role>:<sig>")` where the
//! signature is `hex(sha256("<secret>:<user_id>:<role>"))`. The engine never
//! stores credentials; whoever holds the signing secret mints identities.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use peerform_core::{store::SurveyStore, user::Role};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// The token-signing secret for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub token_secret: String,
}

/// The verified caller: present in a handler means the bearer token checked
/// out against the signing secret.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
  pub user_id: Uuid,
  pub role:    Role,
}

impl Identity {
  /// Gate for professor-only operations.
  pub fn require_professor(&self) -> Result<(), ApiError> {
    match self.role {
      Role::Professor => Ok(()),
      Role::Student => {
        Err(ApiError::Forbidden("professor role required".to_string()))
      }
    }
  }
}

fn role_tag(role: Role) -> &'static str {
  match role {
    Role::Student => "student",
    Role::Professor => "professor",
  }
}

fn signature(secret: &str, user_id: Uuid, role: Role) -> String {
  let mut hasher = Sha256::new();
  hasher.update(format!("{secret}:{user_id}:{}", role_tag(role)));
  hex::encode(hasher.finalize())
}

/// Mint a bearer token for a user. Exposed so the server binary can issue
/// tokens from the command line.
pub fn issue_token(secret: &str, user_id: Uuid, role: Role) -> String {
  let sig = signature(secret, user_id, role);
  B64.encode(format!("{user_id}:{}:{sig}", role_tag(role)))
}

/// Verify a bearer token directly from headers.
pub fn verify_token(
  headers: &HeaderMap,
  config: &AuthConfig,
) -> Result<Identity, ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Bearer ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let token = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let mut parts = token.splitn(3, ':');
  let (id, role, sig) = match (parts.next(), parts.next(), parts.next()) {
    (Some(id), Some(role), Some(sig)) => (id, role, sig),
    _ => return Err(ApiError::Unauthorized),
  };

  let user_id = Uuid::parse_str(id).map_err(|_| ApiError::Unauthorized)?;
  let role = match role {
    "student" => Role::Student,
    "professor" => Role::Professor,
    _ => return Err(ApiError::Unauthorized),
  };

  if sig != signature(&config.token_secret, user_id, role) {
    return Err(ApiError::Unauthorized);
  }

  Ok(Identity { user_id, role })
}

impl<S> FromRequestParts<AppState<S>> for Identity
where
  S: SurveyStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_token(&parts.headers, &state.auth)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> AuthConfig {
    AuthConfig { token_secret: "hunter2".to_string() }
  }

  fn headers_with(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      format!("Bearer {token}").parse().unwrap(),
    );
    headers
  }

  #[test]
  fn round_trip() {
    let user_id = Uuid::new_v4();
    let token = issue_token("hunter2", user_id, Role::Professor);
    let identity = verify_token(&headers_with(&token), &config()).unwrap();
    assert_eq!(identity.user_id, user_id);
    assert_eq!(identity.role, Role::Professor);
  }

  #[test]
  fn wrong_secret_rejected() {
    let token = issue_token("other-secret", Uuid::new_v4(), Role::Student);
    assert!(verify_token(&headers_with(&token), &config()).is_err());
  }

  #[test]
  fn role_is_part_of_the_signature() {
    // A student must not be able to flip the role field to professor.
    let user_id = Uuid::new_v4();
    let sig_as_student = {
      let token = issue_token("hunter2", user_id, Role::Student);
      let decoded = B64.decode(token).unwrap();
      String::from_utf8(decoded).unwrap().rsplit(':').next().unwrap().to_string()
    };
    let forged = B64.encode(format!("{user_id}:professor:{sig_as_student}"));
    assert!(verify_token(&headers_with(&forged), &config()).is_err());
  }

  #[test]
  fn missing_header_rejected() {
    assert!(verify_token(&HeaderMap::new(), &config()).is_err());
  }

  #[test]
  fn garbage_token_rejected() {
    assert!(verify_token(&headers_with("!!!not-base64!!!"), &config()).is_err());
  }
}
