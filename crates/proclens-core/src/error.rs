use thiserror::Error;

/// Core error types for proclens operations
#[derive(Error, Debug)]
pub enum ProclensError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend rejected command: {0}")]
    Backend(String),

    #[error("A {0} command is already in flight")]
    CommandInFlight(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed push message: {0}")]
    MalformedPush(String),

    #[error("Layer cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ProclensError {
    pub fn transport(message: impl Into<String>) -> Self {
        ProclensError::Transport(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        ProclensError::Backend(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ProclensError::Configuration(message.into())
    }

    /// Check if this error is retryable
    ///
    /// Only transport-level failures (network, timeout) are worth retrying;
    /// a backend rejection will not change on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProclensError::Transport(_))
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProclensError::Configuration(_) | ProclensError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProclensError::transport("connection refused");
        let display = format!("{error}");
        assert!(display.contains("Transport error"));

        let error = ProclensError::backend("no such pid 42");
        let display = format!("{error}");
        assert!(display.contains("Backend rejected command"));

        let error = ProclensError::CommandInFlight("kill-all");
        let display = format!("{error}");
        assert!(display.contains("kill-all"));
    }

    #[test]
    fn test_error_categorization() {
        // Retryable errors
        assert!(ProclensError::transport("test").is_retryable());

        // Non-retryable errors
        assert!(!ProclensError::backend("test").is_retryable());
        assert!(!ProclensError::CommandInFlight("kill-all").is_retryable());
        assert!(!ProclensError::configuration("test").is_retryable());
        assert!(!ProclensError::MalformedPush("test".to_string()).is_retryable());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(ProclensError::configuration("bad interval").is_permanent());
        assert!(ProclensError::Cancelled.is_permanent());
        assert!(!ProclensError::transport("timeout").is_permanent());
        assert!(!ProclensError::backend("access denied").is_permanent());
    }

    #[test]
    fn test_error_debug_format() {
        let error = ProclensError::backend("access denied to kill process 7");
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Backend"));
        assert!(debug_str.contains("access denied"));
    }
}
