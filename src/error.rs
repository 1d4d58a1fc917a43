//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Litehouse.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Conflict`: A connection or saved query with the same derived id already exists
//! - `NotFound`: Update, delete or enable referenced an unknown id
//! - `NoEnabledConnection`: Nothing is enabled to query against (code `NOT_FOUND`)
//! - `ConnectionTimeout`: The billing API did not answer the login request in time
//! - `AuthenticationFailed`: A session could not be created for any other reason
//! - `EmptyResult`: The query ran but produced no rows (a warning, not a failure)
//! - `QueryFailed`: Any other query failure, with the underlying message
//! - `Persistence`: The configuration file could not be read or written
//! - `InvalidInput`: Malformed input or an unsupported option
//! - `ExportFailed`: An export artifact could not be produced

use thiserror::Error;

/// Main error type for Litehouse operations
#[derive(Error, Debug)]
pub enum LitehouseError {
    /// Derived id collides with an existing record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// No connection is enabled, so there is nothing to query against
    #[error("Not found: no connection is enabled")]
    NoEnabledConnection,

    /// Session acquisition timed out
    #[error("Connection timed out: {0}")]
    ConnectionTimeout(String),

    /// Session acquisition failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Query succeeded with zero rows
    #[error("{0}")]
    EmptyResult(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Backing file could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Export serialization or file write failed
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

impl LitehouseError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound(_) | Self::NoEnabledConnection => "NOT_FOUND",
            Self::ConnectionTimeout(_) => "CONNECTION_TIMEOUT",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::EmptyResult(_) => "EMPTY_RESULT",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ExportFailed(_) => "EXPORT_FAILED",
        }
    }

    /// Whether this error should be surfaced as a warning rather than a failure
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self, Self::EmptyResult(_))
    }

    /// Follow-up guidance for the user, if any
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConnectionTimeout(_) => {
                Some("The API may be temporarily down. Please check the status of your org.")
            }
            Self::AuthenticationFailed(_) => Some("Please verify connection settings."),
            Self::NoEnabledConnection => Some("Please create and enable a connection."),
            _ => None,
        }
    }

    /// Get human-readable error message
    ///
    /// Never contains credentials; messages are built from names and ids only.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create the error for an empty enabled connection pointer
    pub const fn no_enabled_connection() -> Self {
        Self::NoEnabledConnection
    }

    /// Create a connection timeout error
    pub fn connection_timeout(message: impl Into<String>) -> Self {
        Self::ConnectionTimeout(message.into())
    }

    /// Create an authentication error
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(message.into())
    }

    /// Create an empty-result warning
    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::EmptyResult(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an export error
    pub fn export_failed(message: impl Into<String>) -> Self {
        Self::ExportFailed(message.into())
    }
}

/// Result type alias for Litehouse operations
pub type Result<T> = std::result::Result<T, LitehouseError>;
