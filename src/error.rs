use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("User is not an active member of this circle")]
    NotMember,
    #[error("Template not found")]
    TemplateNotFound,
    #[error("Deadline must be in the future and within the allowed range")]
    InvalidDeadline,
    #[error("Circle needs at least {required} candidates besides the creator, found {found}")]
    InsufficientRoster { required: usize, found: usize },
    #[error("Poll not found")]
    PollNotFound,
    #[error("Poll has ended")]
    PollEnded,
    #[error("Voters cannot vote for themselves")]
    SelfVote,
    #[error("Candidate not found in this poll")]
    CandidateNotFound,
    #[error("User already voted on this poll")]
    AlreadyVoted,
    #[error("Only the poll creator can do this")]
    NotCreator,
    #[error("Poll is already closed")]
    AlreadyClosed,
    #[error("Deletion window has expired")]
    WindowExpired,
    #[error("Integrity fault: {0}")]
    Integrity(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub type PollResult<T> = Result<T, PollError>;

impl PollError {
    pub fn code(&self) -> &'static str {
        match self {
            PollError::Unauthorized => "UNAUTHORIZED",
            PollError::InvalidRequest(_) => "INVALID_REQUEST",
            PollError::NotMember => "NOT_MEMBER",
            PollError::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            PollError::InvalidDeadline => "INVALID_DEADLINE",
            PollError::InsufficientRoster { .. } => "INSUFFICIENT_ROSTER",
            PollError::PollNotFound => "POLL_NOT_FOUND",
            PollError::PollEnded => "POLL_ENDED",
            PollError::SelfVote => "SELF_VOTE",
            PollError::CandidateNotFound => "CANDIDATE_NOT_FOUND",
            PollError::AlreadyVoted => "ALREADY_VOTED",
            PollError::NotCreator => "NOT_CREATOR",
            PollError::AlreadyClosed => "ALREADY_CLOSED",
            PollError::WindowExpired => "WINDOW_EXPIRED",
            PollError::Integrity(_) => "INTERNAL_ERROR",
            PollError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PollError::Unauthorized => StatusCode::UNAUTHORIZED,
            PollError::InvalidRequest(_)
            | PollError::InvalidDeadline
            | PollError::SelfVote => StatusCode::BAD_REQUEST,
            PollError::NotMember | PollError::NotCreator | PollError::WindowExpired => {
                StatusCode::FORBIDDEN
            }
            PollError::TemplateNotFound
            | PollError::PollNotFound
            | PollError::CandidateNotFound => StatusCode::NOT_FOUND,
            PollError::InsufficientRoster { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PollError::PollEnded | PollError::AlreadyVoted | PollError::AlreadyClosed => {
                StatusCode::CONFLICT
            }
            PollError::Integrity(_) | PollError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        // Storage details stay in the log.
        let details = match &self {
            PollError::Integrity(_) | PollError::DatabaseError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "details": details
        }));

        (status, body).into_response()
    }
}

/// Failures surfaced by a `PollStore` or `Roster` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            _ => StoreError::Database(error.to_string()),
        }
    }
}

impl From<StoreError> for PollError {
    fn from(error: StoreError) -> Self {
        PollError::DatabaseError(error.to_string())
    }
}
