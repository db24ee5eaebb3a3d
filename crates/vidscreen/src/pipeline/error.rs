use thiserror::Error;

use crate::ai::AiError;
use crate::db::DatabaseError;
use crate::external::ExternalError;
use crate::llm::LlmError;

/// Errors surfaced by pipeline operations and stage workers.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline record not found: {0}")]
    NotFound(String),

    #[error("Invalid pipeline transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Pipeline record '{id}' is no longer in status '{expected}'")]
    StatusConflict { id: String, expected: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No delivery channel succeeded for applicant '{applicant_id}'")]
    Undelivered { applicant_id: String },

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("AI backend error: {0}")]
    Ai(#[from] AiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("External service error: {0}")]
    External(#[from] ExternalError),
}

impl From<DatabaseError> for PipelineError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::InvalidTransition { from, to } => {
                PipelineError::InvalidTransition { from, to }
            }
            DatabaseError::StatusConflict { id, expected } => {
                PipelineError::StatusConflict { id, expected }
            }
            other => PipelineError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_transition_errors_are_lifted() {
        let err: PipelineError = DatabaseError::InvalidTransition {
            from: "sent".into(),
            to: "done".into(),
        }
        .into();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));

        let err: PipelineError = DatabaseError::LockPoisoned.into();
        assert!(matches!(err, PipelineError::Database(_)));
    }
}
