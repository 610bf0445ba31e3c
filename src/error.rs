//! Error taxonomy for the interview engine.
//!
//! Only `SessionNotFound` is terminal for a caller. Every other variant is
//! recoverable: the engine records it as a gap or degradation and keeps going.

use crate::models::InterviewBlock;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Extraction failed for field '{field}' (question {question_id}): {reason}")]
    ExtractionFailure {
        question_id: String,
        field: String,
        reason: String,
    },

    #[error("Model call '{operation}' timed out after {seconds}s")]
    ModelTimeout { operation: String, seconds: u64 },

    #[error("Model response for '{operation}' violated schema: {message}")]
    ModelSchemaViolation { operation: String, message: String },

    #[error("Budget exceeded for session {session_id}: spent ${spent:.4} of ${limit:.4}")]
    BudgetExceeded {
        session_id: String,
        spent: f64,
        limit: f64,
    },

    #[error("Invalid block transition from {from} to {to}")]
    InvalidTransition {
        from: InterviewBlock,
        to: InterviewBlock,
    },

    #[error("{0} is already set for this session")]
    AlreadySet(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Assessment not finished: {0}")]
    AssessmentNotFinished(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SessionNotFound(_) => "session_not_found",
            EngineError::QuestionNotFound(_) => "question_not_found",
            EngineError::ExtractionFailure { .. } => "extraction_failure",
            EngineError::ModelTimeout { .. } => "model_timeout",
            EngineError::ModelSchemaViolation { .. } => "model_schema_violation",
            EngineError::BudgetExceeded { .. } => "budget_exceeded",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::AlreadySet(_) => "already_set",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::AssessmentNotFinished(_) => "assessment_not_finished",
            EngineError::Model(_) => "model_error",
            EngineError::Storage(_) => "storage_error",
            EngineError::Config(_) => "config_error",
        }
    }

    /// Whether the engine can continue the interview after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::SessionNotFound(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_not_found_is_terminal() {
        assert!(!EngineError::SessionNotFound("s1".to_string()).is_recoverable());
        assert!(EngineError::QuestionNotFound("q1".to_string()).is_recoverable());
        assert!(EngineError::BudgetExceeded {
            session_id: "s1".to_string(),
            spent: 1.0,
            limit: 0.5,
        }
        .is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::InvalidTransition {
            from: InterviewBlock::RiskScan,
            to: InterviewBlock::Context,
        };
        assert_eq!(
            err.to_string(),
            "Invalid block transition from risk-scan to context"
        );
        assert_eq!(err.code(), "invalid_transition");
    }
}
