//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::AttemptError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the remote REST backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("remote reply was empty")]
    EmptyResponse,
    #[error(transparent)]
    Aggregate(#[from] AttemptError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<RemoteError> for StorageError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Aggregate(e) => StorageError::Serialization(e.to_string()),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Failures while reading one question tier. Logged, then the next tier is tried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("tier is not configured")]
    Absent,
    #[error("tier yielded no valid questions")]
    NoValidQuestions,
    #[error("question document is malformed: {0}")]
    Document(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionSource`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionSourceError {
    #[error("no valid questions available from any source")]
    NoValidQuestions,
}

/// Errors emitted by `PersistenceGateway`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("attempt could not be written to any backing: {0}")]
    Write(#[source] StorageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizSession` transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available; reload and try again")]
    EmptyBank,
    #[error("questions are still loading")]
    LoadInProgress,
    #[error("a session is already running")]
    AlreadyStarted,
    #[error("no session is running")]
    NotStarted,
    #[error("the current question has not been answered")]
    NotAnswered,
    #[error("the session has not finished")]
    NotFinished,
}

/// Tick-sound failures. Never propagated past the timer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AudioError {
    #[error("audio output is unavailable")]
    Unavailable,
    #[error("audio device error: {0}")]
    Device(String),
}

/// Speech output failures. Logged, never surfaced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NarrationError {
    #[error("speech output is unavailable")]
    Unavailable,
    #[error("speech output failed: {0}")]
    Output(String),
}

/// Errors emitted while bootstrapping services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
