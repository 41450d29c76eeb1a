//! # Error Types
//!
//! Error taxonomy for the Switchyard control plane using `thiserror`.

/// Custom result type for Switchyard operations
pub type Result<T> = std::result::Result<T, SwitchyardError>;

/// Main error type for the Switchyard control plane
#[derive(thiserror::Error, Debug)]
pub enum SwitchyardError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single resource source failed to list or watch
    #[error("Source '{source_name}' error: {message}")]
    Source { source_name: String, message: String },

    /// Auxiliary data discovery failed (external service, decoding, ...)
    #[error("Discovery error: {message}")]
    Discovery { message: String },

    /// An optimistic-concurrency write lost against a concurrent writer
    #[error("Write conflict on {resource}: expected version {expected}, found {actual}")]
    Conflict { resource: String, expected: u64, actual: u64 },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Strict validation rejected a translation cycle
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Output would violate a consistency invariant
    #[error("Invariant violation: {message}")]
    Invariant { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Outbound HTTP errors
    #[error("HTTP error: {context}")]
    Http {
        #[source]
        source: reqwest::Error,
        context: String,
    },

    /// The governing cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SwitchyardError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a source error tagged with the source name
    pub fn source<N: Into<String>, S: Into<String>>(source_name: N, message: S) -> Self {
        Self::Source { source_name: source_name.into(), message: message.into() }
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery { message: message.into() }
    }

    /// Create a write conflict error
    pub fn conflict<R: Into<String>>(resource: R, expected: u64, actual: u64) -> Self {
        Self::Conflict { resource: resource.into(), expected, actual }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create an invariant violation
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::Invariant { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Add context to an error
    pub fn context<S: Into<String>>(mut self, context: S) -> Self {
        let context = context.into();
        match &mut self {
            SwitchyardError::Io { context: ctx, .. }
            | SwitchyardError::Http { context: ctx, .. }
            | SwitchyardError::Serialization { context: ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            SwitchyardError::Discovery { message } | SwitchyardError::Internal { message } => {
                *message = format!("{}: {}", context, message);
            }
            _ => {}
        }
        self
    }

    /// Check if this error is environmental and should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwitchyardError::Source { .. }
                | SwitchyardError::Discovery { .. }
                | SwitchyardError::Conflict { .. }
                | SwitchyardError::NotFound { .. }
                | SwitchyardError::Io { .. }
                | SwitchyardError::Http { .. }
        )
    }
}

impl From<std::io::Error> for SwitchyardError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for SwitchyardError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<reqwest::Error> for SwitchyardError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http { source: error, context: "HTTP request failed".to_string() }
    }
}

impl From<config::ConfigError> for SwitchyardError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for SwitchyardError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = SwitchyardError::config("Test configuration error");
        assert!(matches!(error, SwitchyardError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_source_error_is_tagged() {
        let error = SwitchyardError::source("kube", "watch stream reset");
        assert_eq!(error.to_string(), "Source 'kube' error: watch stream reset");
    }

    #[test]
    fn test_conflict_message() {
        let error = SwitchyardError::conflict("gloo-system/aws", 3, 4);
        assert_eq!(
            error.to_string(),
            "Write conflict on gloo-system/aws: expected version 3, found 4"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SwitchyardError::discovery("timeout").is_retryable());
        assert!(SwitchyardError::conflict("a/b", 1, 2).is_retryable());
        assert!(SwitchyardError::not_found("upstream", "a/b").is_retryable());
        assert!(!SwitchyardError::invariant("dangling").is_retryable());
        assert!(!SwitchyardError::Cancelled.is_retryable());
        assert!(!SwitchyardError::validation("strict").is_retryable());
    }

    #[test]
    fn test_context_is_prefixed() {
        let error = SwitchyardError::discovery("connection refused").context("list functions");
        assert_eq!(error.to_string(), "Discovery error: list functions: connection refused");

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = SwitchyardError::from(io_error).context("read /etc/switchyard");
        assert_eq!(error.to_string(), "I/O error: read /etc/switchyard: I/O operation failed");
    }

    #[test]
    fn test_error_conversions() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: SwitchyardError = json_error.into();
        assert!(matches!(error, SwitchyardError::Serialization { .. }));
    }
}
