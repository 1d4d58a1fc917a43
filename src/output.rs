//! JSON Output Envelope Types
//!
//! This module defines the structured JSON output format for every Litehouse command.
//! All commands return either a SuccessEnvelope or an ErrorEnvelope.
//!
//! # Output Contract
//! - Success: `{"ok": true, "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "error": {...}}` where the error
//!   object carries `code`, `message`, `severity` and an optional `hint`
//!
//! Warnings (an empty query result) use the error envelope with
//! `"severity": "warning"`.

use serde::{Deserialize, Serialize};

use crate::error::LitehouseError;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (e.g. `connection add`, `export`)
    pub command: String,

    /// Command-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(command: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self {
            ok: true,
            command: command.into(),
            data,
            meta,
        }
    }
}

/// Error envelope for failures and warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(command: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            command: command.into(),
            error,
        }
    }

    /// Create error envelope from LitehouseError
    pub fn from_error(command: impl Into<String>, err: &LitehouseError) -> Self {
        Self::new(
            command,
            ErrorInfo {
                code: err.error_code().to_string(),
                message: err.message(),
                severity: if err.is_warning() { Severity::Warning } else { Severity::Error },
                hint: err.hint().map(str::to_string),
            },
        )
    }
}

/// How the caller should treat a failed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "CONFLICT", "QUERY_FAILED")
    pub code: String,

    /// Human-readable message (never contains credentials)
    pub message: String,

    pub severity: Severity,

    /// Suggested next step, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: Severity::Error,
            hint: None,
        }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of rows handled (exports and query results, None otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    pub fn new(execution_ms: u64) -> Self {
        Self {
            execution_ms,
            rows_returned: None,
        }
    }

    pub fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self {
            execution_ms,
            rows_returned: Some(rows_returned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = SuccessEnvelope::new(
            "export",
            serde_json::json!({"path": "/tmp/x.csv"}),
            Metadata::with_rows(42, 10),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""command":"export"#));
        assert!(json.contains(r#""execution_ms":42"#));
        assert!(json.contains(r#""rows_returned":10"#));
    }

    #[test]
    fn test_error_envelope_from_litehouse_error() {
        let err = LitehouseError::connection_timeout("login took too long");
        let envelope = ErrorEnvelope::from_error("connection test", &err);

        assert!(!envelope.ok);
        assert_eq!(envelope.command, "connection test");
        assert_eq!(envelope.error.code, "CONNECTION_TIMEOUT");
        assert_eq!(envelope.error.severity, Severity::Error);
        assert!(envelope.error.hint.unwrap().contains("temporarily down"));
    }

    #[test]
    fn test_empty_result_is_warning() {
        let err = LitehouseError::empty_result("No data found for query.");
        let json = serde_json::to_value(ErrorEnvelope::from_error("query", &err)).unwrap();

        assert_eq!(json["error"]["severity"], "warning");
        assert_eq!(json["error"]["message"], "No data found for query.");
        assert!(json["error"].get("hint").is_none());
    }

    #[test]
    fn test_metadata_without_rows() {
        let json = serde_json::to_string(&Metadata::new(100)).unwrap();

        assert!(json.contains(r#""execution_ms":100"#));
        // rows_returned should be omitted when None
        assert!(!json.contains("rows_returned"));
    }

    #[test]
    fn test_error_info_defaults() {
        let info = ErrorInfo::new("QUERY_FAILED", "Syntax error");
        assert_eq!(info.severity, Severity::Error);
        assert!(info.hint.is_none());
    }
}
