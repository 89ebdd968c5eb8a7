//! Errors raised by platform bindings

use thiserror::Error;

/// Failure reported by a native permission primitive
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The primitive was invoked but the platform reported a failure
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    /// The binding cannot serve requests (launcher not registered, host gone)
    #[error("Platform binding unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    /// Create a failure for the named primitive
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }

    /// Create an unavailable-binding error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PlatformError::failed("request_single", "activity not attached");
        assert_eq!(
            err.to_string(),
            "request_single failed: activity not attached"
        );

        let err = PlatformError::unavailable("launcher not registered");
        assert!(err.to_string().contains("launcher not registered"));
    }
}
