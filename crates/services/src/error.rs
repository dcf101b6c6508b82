//! Shared error types for the services crate.

use thiserror::Error;

use portal_core::model::{AttemptError, QuizId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

//
// ─── API ───────────────────────────────────────────────────────────────────────
//

/// Coarse classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The request never produced an HTTP response.
    Network,
    /// 5xx.
    Server,
    /// 4xx that is not one of the more specific kinds below.
    Validation,
    /// The server already holds a submission for this quiz.
    DuplicateSubmission,
    NotFound,
    Forbidden,
    Unauthorized,
    /// A response arrived but could not be understood.
    Decode,
}

impl ApiErrorKind {
    /// Classify a rejected request from its status and server message.
    #[must_use]
    pub fn classify(status: u16, message: &str) -> Self {
        match status {
            500..=599 => ApiErrorKind::Server,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::DuplicateSubmission,
            _ if is_duplicate_message(message) => ApiErrorKind::DuplicateSubmission,
            _ => ApiErrorKind::Validation,
        }
    }
}

fn is_duplicate_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ["déjà soumis", "deja soumis", "already submitted"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Errors emitted by `ApiClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        kind: ApiErrorKind,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError::Rejected {
            status,
            kind: ApiErrorKind::classify(status, &message),
            message,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::InvalidUrl(_) => ApiErrorKind::Validation,
            ApiError::Network(_) => ApiErrorKind::Network,
            ApiError::Rejected { kind, .. } => *kind,
            ApiError::Decode(_) => ApiErrorKind::Decode,
        }
    }

    /// Network failures and 5xx responses may succeed when repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ApiErrorKind::Network | ApiErrorKind::Server)
    }

    /// Server-provided message, or the display form for local failures.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

//
// ─── AUTH ──────────────────────────────────────────────────────────────────────
//

/// Errors emitted by `AuthSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("this action requires an administrator")]
    AdminRequired,
    #[error("login refused: {0}")]
    Rejected(String),
    #[error(transparent)]
    Invalid(#[from] portal_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// Errors emitted by `QuizSessionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("could not load quiz: {0}")]
    Load(#[source] ApiError),
    #[error("submission failed and can be retried: {0}")]
    SubmissionNetwork(#[source] ApiError),
    #[error("submission rejected: {message}")]
    Validation { message: String },
    #[error("session expired, log in again")]
    Unauthorized,
    #[error("no quiz loaded")]
    NotLoaded,
    #[error("another quiz session is still in progress")]
    AlreadyActive,
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

//
// ─── ENDPOINT SERVICES ─────────────────────────────────────────────────────────
//

/// Errors emitted by the pass-through endpoint services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Invalid(#[from] portal_core::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}
