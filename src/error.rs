//! Error taxonomy for the question-answering service.
//!
//! Collaborator failures arrive as `anyhow::Error` and are wrapped by the
//! pipeline stage they interrupted, so callers can tell a failed ingestion
//! from a failed retrieval or generation. The wrapped error keeps its full
//! context chain; `{:#}` formatting prints it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed request, rejected before any external call.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("System not initialized. Please call /initialize first.")]
    NotInitialized,

    #[error("System already initialized")]
    AlreadyInitialized,

    #[error("Document ingestion is already in progress")]
    IngestionInProgress,

    #[error("Ingestion failed: {0:#}")]
    Ingestion(anyhow::Error),

    #[error("Retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("Answer generation failed: {0:#}")]
    Generation(anyhow::Error),
}

impl RagError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        RagError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Validation { .. } => "bad_request",
            RagError::NotInitialized => "not_initialized",
            RagError::AlreadyInitialized => "already_initialized",
            RagError::IngestionInProgress => "ingestion_in_progress",
            RagError::Ingestion(_) => "ingestion_failed",
            RagError::Retrieval(_) => "retrieval_failed",
            RagError::Generation(_) => "generation_failed",
        }
    }

    /// The collaborator error behind a pipeline failure, if any.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            RagError::Ingestion(e) | RagError::Retrieval(e) | RagError::Generation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_display_keeps_cause_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = RagError::Retrieval(inner.context("embedding question").unwrap_err());
        let text = err.to_string();
        assert!(text.contains("Retrieval failed"));
        assert!(text.contains("embedding question"));
        assert!(text.contains("connection refused"));
        assert_eq!(err.code(), "retrieval_failed");
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_validation_names_field() {
        let err = RagError::validation("question", "must be at least 5 characters");
        assert_eq!(err.to_string(), "question: must be at least 5 characters");
        assert_eq!(err.code(), "bad_request");
        assert!(err.cause().is_none());
    }
}
