//! Error handling for login-history processing.

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures while retrieving or parsing the login history
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// One log line could not be turned into a session record
    #[error("Skipped login record: {reason}")]
    ParseSkip { reason: String },

    /// The login-history command could not produce usable output
    #[error("Login history command `{command}` failed: {reason}")]
    ExternalCommandFailure { command: String, reason: String },
}

impl SessionError {
    /// Create a parse skip error
    pub fn parse_skip(reason: impl Into<String>) -> Self {
        Self::ParseSkip {
            reason: reason.into(),
        }
    }

    /// Create an external command failure
    pub fn command_failed(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalCommandFailure {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SessionError::ParseSkip { .. } => "parse",
            SessionError::ExternalCommandFailure { .. } => "command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let skip = SessionError::parse_skip("only 2 date fields");
        assert_eq!(skip.category(), "parse");

        let failed = SessionError::command_failed("last", "exit status: 1");
        assert_eq!(failed.category(), "command");
        assert_eq!(
            failed.to_string(),
            "Login history command `last` failed: exit status: 1"
        );
    }
}
