//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid server name '{0}': {1}")]
    InvalidServerName(String, &'static str),

    #[error("Invalid tool call transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::InvalidServerName("a/b".into(), "contains '/'").is_cancelled());
        assert!(
            !DomainError::InvalidTransition {
                from: "completed".into(),
                to: "in_progress".into()
            }
            .is_cancelled()
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = DomainError::InvalidTransition {
            from: "completed".into(),
            to: "pending".into(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid tool call transition: completed -> pending"
        );
    }
}
