use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::redacted_uri;
use crate::model::{common::election::ElectionType, mongodb::Id};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid choice: {0}")]
    InvalidChoice(#[from] ChoiceError),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Machine-readable kind, reported to API clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) => "storage",
            Self::Jwt(_) => "unauthorized",
            Self::Validation(_) => "validation",
            Self::InvalidChoice(_) => "invalid_choice",
            Self::NotEligible(_) => "not_eligible",
            Self::Unauthorized(_) => "unauthorized",
            Self::State(StateError::ElectionNotOpen) => "election_not_open",
            Self::State(StateError::NotCompleted) => "not_completed",
            Self::Conflict(ConflictError::AlreadyVoted) => "already_voted",
            Self::Conflict(ConflictError::DuplicateUrl(_)) => "duplicate_url",
            Self::NotFound(_) => "not_found",
            Self::Storage(StorageError::Unavailable(_)) => "storage_unavailable",
            Self::Storage(StorageError::TokenSpaceExhausted(_)) => "storage",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::InvalidChoice(_) => Status::BadRequest,
            Self::NotEligible(_) => Status::Forbidden,
            Self::Unauthorized(_) | Self::Jwt(_) => Status::Unauthorized,
            Self::State(_) | Self::Conflict(_) => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::Storage(StorageError::Unavailable(_)) => Status::ServiceUnavailable,
            Self::Db(_) | Self::Storage(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }
}

/// The election is in the wrong state for the requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Election is not open for voting")]
    ElectionNotOpen,
    #[error("Election has not been completed")]
    NotCompleted,
}

/// The operation would break a uniqueness rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// The caller has already voted. After an interrupted submission this
    /// means the earlier attempt most likely succeeded.
    #[error("A vote has already been recorded for this user")]
    AlreadyVoted,
    #[error("Another election already uses the url '{0}'")]
    DuplicateUrl(String),
}

/// A ballot's content does not fit the election.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoiceError {
    #[error("This is a {expected} election")]
    WrongType { expected: ElectionType },
    #[error("Candidate {0} is not standing in this election")]
    UnknownCandidate(Id),
    #[error("Candidate {0} is ranked more than once")]
    DuplicateCandidate(Id),
}

/// The storage layer could not complete the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Nothing was written; the caller may retry.
    #[error("Storage temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("Could not find an unused vote token after {0} attempts")]
    TokenSpaceExhausted(u32),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let uri = redacted_uri(req);
        if status.code >= 500 {
            error!("{} {uri}: {self}", req.method());
        } else {
            warn!("{} {uri}: {self}", req.method());
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_voted_is_a_conflict_not_a_failure() {
        let err = Error::from(ConflictError::AlreadyVoted);
        assert_eq!(err.status(), Status::Conflict);
        assert_eq!(err.kind(), "already_voted");
    }

    #[test]
    fn only_unavailable_storage_is_retryable() {
        let retryable = Error::from(StorageError::Unavailable("timeout".to_string()));
        assert_eq!(retryable.status(), Status::ServiceUnavailable);
        let fatal = Error::from(StorageError::TokenSpaceExhausted(5));
        assert_eq!(fatal.status(), Status::InternalServerError);
    }
}
