use thiserror::Error;

use crate::db::DatabaseError;

/// Errors from the AI backend adapter.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI backend returned {status} during {stage}: {body}")]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },

    /// The backend answered with something the adapter cannot interpret.
    #[error("Unexpected AI backend response: {0}")]
    Protocol(String),

    /// The job ended with an `error` event.
    #[error("AI backend reported an error: {0}")]
    Remote(String),

    #[error("Event stream closed before a terminal event")]
    StreamClosed,

    /// The caller's cancellation signal fired.
    #[error("AI request cancelled")]
    Cancelled,

    #[error("AI lock is not held by '{owner}'")]
    LockNotHeld { owner: String },

    #[error("Session store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to open video: {0}")]
    Video(String),

    /// A failure of one adapter step.
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<AiError>,
    },
}

impl AiError {
    pub(crate) fn at(self, step: &'static str) -> Self {
        AiError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Whether this error, or the step failure it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AiError::Cancelled => true,
            AiError::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether a different session is still in flight.
    pub fn is_unfinished_request(&self) -> bool {
        match self {
            AiError::Database(DatabaseError::UnfinishedRequest { .. }) => true,
            AiError::Step { source, .. } => source.is_unfinished_request(),
            _ => false,
        }
    }
}
