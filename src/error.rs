//! Error types for autodiscover operations.
//!
//! Request-time failures are collected in [`AutodiscoverError`], which the
//! handler catches exactly once per request and hands to the error mapper.
//! Startup failures live in [`ConfigError`] and never reach the request path.

use std::error::Error as StdError;

/// Main error type for a single autodiscover request.
///
/// Every stage of the request pipeline fails fast with one of these variants.
/// The mapper in [`crate::handler`] turns them into an HTTP status, headers and
/// a log entry.
#[derive(Debug, thiserror::Error)]
pub enum AutodiscoverError {
    /// The request body exceeded the configured input limit
    #[error(
        "The request will not be processed as the input exceeds our maximum expected input size ({limit} bytes)."
    )]
    PayloadTooLarge { limit: usize },

    /// Credentials were missing or rejected by the backend
    #[error("{0}")]
    AuthenticationRequired(AuthFailure),

    /// The request XML is missing a field or asks for an unsupported schema
    #[error("{message}")]
    InvalidRequest { message: String },

    /// An error that carries its own HTTP status and headers
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Errors from the user-provided backend
    #[error("Backend error")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),

    /// Anything else that went wrong while building the response
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Why authentication was required.
///
/// The client always sees the same 401 challenge; the variant only changes
/// what ends up in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// No usable Basic credentials were sent
    #[error("Access denied. No username or password provided.")]
    MissingCredentials,

    /// A username was sent without a password
    #[error("Access denied. No password provided.")]
    MissingPassword,

    /// The backend rejected the credentials
    #[error("Access denied. Username or password incorrect.")]
    IncorrectCredentials,
}

/// An error with an explicit HTTP status line and header set.
///
/// Backends may return these (via `Into<AutodiscoverError>`) to control the
/// exact reply the device receives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase sent with the status code
    pub reason: String,
    /// Extra `Name: value` header lines
    pub headers: Vec<String>,
    /// Human readable description, only ever logged
    pub message: String,
}

impl ProtocolError {
    /// Create a protocol error without extra headers.
    pub fn new(status: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Add a header line to send with the status.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// The device has to provision before it may continue.
    pub fn provisioning_required() -> Self {
        Self::new(
            449,
            "Retry after sending a PROVISION command",
            "Provisioning required",
        )
    }

    /// Status line fragment in the form `449 Retry after sending a PROVISION command`.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.status, self.reason)
    }
}

/// Errors detected while loading or validating the startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is missing or invalid
    #[error("Misconfiguration: {message}")]
    Misconfiguration { message: String },

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for this schema
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

// Convenience methods for creating common errors
impl AutodiscoverError {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a backend error.
    ///
    /// Backends that already fail with an [`AutodiscoverError`] or a
    /// [`ProtocolError`] keep their classification.
    pub fn backend<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let boxed: Box<dyn StdError + Send + Sync> = Box::new(error);
        let boxed = match boxed.downcast::<AutodiscoverError>() {
            Ok(error) => return *error,
            Err(other) => other,
        };
        match boxed.downcast::<ProtocolError>() {
            Ok(protocol) => Self::Protocol(*protocol),
            Err(other) => Self::Backend(other),
        }
    }

    /// Whether this is any flavour of authentication failure.
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, Self::AuthenticationRequired(_))
    }

    /// Short kind name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::AuthenticationRequired(_) => "AuthenticationRequired",
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::Protocol(_) => "ProtocolError",
            Self::Backend(_) => "BackendError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

impl From<AuthFailure> for AutodiscoverError {
    fn from(failure: AuthFailure) -> Self {
        Self::AuthenticationRequired(failure)
    }
}

impl ConfigError {
    /// Create a misconfiguration error
    pub fn misconfiguration(message: impl Into<String>) -> Self {
        Self::Misconfiguration {
            message: message.into(),
        }
    }
}

/// Join an error and all of its sources, outermost first, with `" -> "`.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        message.push_str(" -> ");
        message.push_str(&cause.to_string());
        current = cause.source();
    }
    message
}

// Result type aliases for convenience
pub type AutodiscoverResult<T> = Result<T, AutodiscoverError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
