//! The domain error enum shared across the engine.
//!
//! The store trait fixes its error type to this enum so that callers (the
//! HTTP layer in particular) can map every variant to a precise outcome:
//! validation failures before any write, `DuplicateTitle` as a conflict the
//! caller must re-confirm, not-found variants per resource, `DraftNotOwned`
//! as an authorisation failure, and `Store` for driver failures after
//! rollback.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("survey form not found: {0}")]
  FormNotFound(Uuid),

  #[error("survey instance not found: {0}")]
  InstanceNotFound(Uuid),

  #[error("response not found: {0}")]
  ResponseNotFound(Uuid),

  #[error("section not found: {0}")]
  SectionNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  /// The response exists but is submitted or belongs to another evaluator.
  #[error("draft {0} is not an open draft of the requester")]
  DraftNotOwned(Uuid),

  #[error("a survey titled {0:?} already exists for this creator")]
  DuplicateTitle(String),

  #[error("survey title must not be empty")]
  EmptyTitle,

  #[error("rating question {question:?} has {count} choices; expected 1 to {max}")]
  BadChoiceCount {
    question: String,
    count:    usize,
    max:      usize,
  },

  #[error("short-answer question {0:?} must not carry choices")]
  ChoicesOnShortAnswer(String),

  /// A storage-driver failure. The enclosing operation's transaction has
  /// already been rolled back when this surfaces.
  #[error("store error: {0}")]
  Store(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
