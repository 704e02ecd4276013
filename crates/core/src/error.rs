//! Error types shared by the post-processing pipeline.

use thiserror::Error;

/// Errors that can occur anywhere in the post-processing pipeline.
///
/// None of these are fatal to the process. The worst outcome of any of them
/// is a dropped capture request whose buffers have been returned.
#[derive(Debug, Error)]
pub enum PostprocError {
    /// A required input was missing or malformed.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A job or tag entry could not be allocated.
    #[error("out of memory: {what}")]
    OutOfMemory { what: String },

    /// The encoder or reprocess hardware rejected an operation.
    #[error("hardware failure during {operation}: {reason}")]
    HardwareFailure { operation: String, reason: String },

    /// A job, frame or ticket lookup missed.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The requested configuration cannot be served.
    #[error("unsupported configuration: {reason}")]
    UnsupportedConfiguration { reason: String },

    /// The dispatcher thread is no longer running.
    #[error("post-processor is not running")]
    NotRunning,

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl PostprocError {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a new out of memory error.
    pub fn out_of_memory(what: impl Into<String>) -> Self {
        Self::OutOfMemory { what: what.into() }
    }

    /// Creates a new hardware failure error.
    pub fn hardware_failure(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HardwareFailure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a new unsupported configuration error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            reason: reason.into(),
        }
    }

    /// Whether this error originated in an external hardware collaborator.
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::HardwareFailure { .. })
    }

    /// Short label used for the `reason` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::OutOfMemory { .. } => "out_of_memory",
            Self::HardwareFailure { .. } => "hardware_failure",
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedConfiguration { .. } => "unsupported_configuration",
            Self::NotRunning => "not_running",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostprocError::hardware_failure("create_session", "busy");
        assert_eq!(
            err.to_string(),
            "hardware failure during create_session: busy"
        );

        let err = PostprocError::invalid_argument("both source frames present");
        assert_eq!(err.to_string(), "invalid argument: both source frames present");
    }

    #[test]
    fn test_is_hardware() {
        assert!(PostprocError::hardware_failure("start_job", "rejected").is_hardware());
        assert!(!PostprocError::not_found("job 7").is_hardware());
        assert!(!PostprocError::NotRunning.is_hardware());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(PostprocError::out_of_memory("tag").kind(), "out_of_memory");
        assert_eq!(
            PostprocError::unsupported("format").kind(),
            "unsupported_configuration"
        );
    }
}
