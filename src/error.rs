//! Error types for the DeltaStream provider.

use thiserror::Error;

/// Errors surfaced by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object does not exist on the control plane.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A configuration value failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error, or a control-plane error with no closer match.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider is not configured, or its configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or config payload did not decode into the expected shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request to the control plane failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The object already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Authentication or authorization failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The control plane is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Polling gave up before the object reached the expected state.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The object reached a state the operation cannot continue from.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not supported for this type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Map a control-plane SQL state and message to an error variant.
    ///
    /// Codes follow the usual SQLSTATE classes: `08` connection problems,
    /// `42501` privileges, `42P01`/`42704`/`3D000`/`3F000` missing objects,
    /// `42710`/`42P07` duplicates. Anything else becomes [`ProviderError::Sdk`].
    pub fn from_sql_state(sql_state: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            format!("statement failed with SQL state {}", sql_state)
        } else {
            format!("{} (SQL state {})", message, sql_state)
        };

        match sql_state {
            "42P01" | "42704" | "3D000" | "3F000" => Self::NotFound(message),
            "42710" | "42P07" => Self::AlreadyExists(message),
            "42501" | "28000" => Self::PermissionDenied(message),
            "53400" => Self::ResourceExhausted(message),
            "57014" => Self::DeadlineExceeded(message),
            "42601" | "22023" => Self::InvalidRequest(message),
            s if s.starts_with("08") => Self::Unavailable(message),
            _ => Self::Sdk(message),
        }
    }

    /// Whether the error means the object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
