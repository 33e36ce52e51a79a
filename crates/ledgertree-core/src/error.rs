//! Error types for ledgertree-core
//!
//! Every failure the engine can surface carries a stable error code, a
//! severity and a detailed, serialisable description with suggestions.
//! Most failures in this crate are recovered locally (see the builder and
//! the statistics aggregator); the ones below are what reaches a caller.

use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Hierarchy not loaded yet
    NotLoaded,
    /// Account not found
    AccountNotFound,
    /// Malformed account record
    InvalidRecord,
    /// Duplicate id or code
    DuplicateEntry,
    /// Account cannot be deleted
    DeleteRefused,
    /// Move rejected by validation
    InvalidMove,
    /// Account store failure
    AccountSourceError,
    /// Ledger store failure
    LedgerSourceError,
    /// Internal error
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::NotLoaded => write!(f, "NOT_LOADED"),
            ErrorCode::AccountNotFound => write!(f, "ACCOUNT_NOT_FOUND"),
            ErrorCode::InvalidRecord => write!(f, "INVALID_RECORD"),
            ErrorCode::DuplicateEntry => write!(f, "DUPLICATE_ENTRY"),
            ErrorCode::DeleteRefused => write!(f, "DELETE_REFUSED"),
            ErrorCode::InvalidMove => write!(f, "INVALID_MOVE"),
            ErrorCode::AccountSourceError => write!(f, "ACCOUNT_SOURCE_ERROR"),
            ErrorCode::LedgerSourceError => write!(f, "LEDGER_SOURCE_ERROR"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Detailed error information for callers and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Suggestions for resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetails {
    /// Create a new error detail
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            suggestions: vec![],
        }
    }

    /// Add detail information
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.details = Some(detail);
        self
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, "\nDetails: {}", details)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational
    Info,
    /// Warning - operation may be affected
    Warning,
    /// Error - operation failed
    Error,
    /// Critical - application may be unstable
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Main error type for ledgertree-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Hierarchy not loaded")]
    NotLoaded,

    #[error("Account not found: {id}")]
    AccountNotFound { id: String },

    #[error("Invalid account record: {message}")]
    InvalidRecord { message: String },

    #[error("Duplicate entry: {entry}")]
    DuplicateEntry { entry: String },

    #[error("Account {id} cannot be deleted: {reason}")]
    DeleteRefused { id: String, reason: String },

    #[error("Invalid move: {}", .errors.join("; "))]
    InvalidMove { errors: Vec<String> },

    #[error("Account source error: {message}")]
    AccountSource { message: String },

    #[error("Ledger source error: {message}")]
    LedgerSource { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::NotLoaded => ErrorCode::NotLoaded,
            CoreError::AccountNotFound { .. } => ErrorCode::AccountNotFound,
            CoreError::InvalidRecord { .. } => ErrorCode::InvalidRecord,
            CoreError::DuplicateEntry { .. } => ErrorCode::DuplicateEntry,
            CoreError::DeleteRefused { .. } => ErrorCode::DeleteRefused,
            CoreError::InvalidMove { .. } => ErrorCode::InvalidMove,
            CoreError::AccountSource { .. } => ErrorCode::AccountSourceError,
            CoreError::LedgerSource { .. } => ErrorCode::LedgerSourceError,
            CoreError::InternalError { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::NotLoaded => ErrorSeverity::Warning,
            CoreError::AccountNotFound { .. } => ErrorSeverity::Info,
            CoreError::InvalidRecord { .. } => ErrorSeverity::Warning,
            CoreError::DuplicateEntry { .. } => ErrorSeverity::Warning,
            CoreError::DeleteRefused { .. } => ErrorSeverity::Warning,
            CoreError::InvalidMove { .. } => ErrorSeverity::Warning,
            CoreError::AccountSource { .. } => ErrorSeverity::Error,
            CoreError::LedgerSource { .. } => ErrorSeverity::Error,
            CoreError::InternalError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::NotLoaded => {
                details = details.with_suggestion(
                    "Call load() before querying or editing the hierarchy.".to_string()
                );
            }
            CoreError::AccountNotFound { id } => {
                details = details.with_suggestion(format!(
                    "Check that account '{}' exists in the current scope.", id
                ));
                details = details.with_suggestion(
                    "Reload the hierarchy if the account was created elsewhere.".to_string()
                );
            }
            CoreError::DeleteRefused { reason, .. } => {
                details = details.with_detail(serde_json::json!({ "reason": reason }));
                details = details.with_suggestion(
                    "Post closing entries to bring the balance to zero first.".to_string()
                );
            }
            CoreError::InvalidMove { errors } => {
                details = details.with_detail(serde_json::json!({ "errors": errors }));
                details = details.with_suggestion(
                    "Pick a target that is not the account itself or one of its descendants.".to_string()
                );
            }
            CoreError::LedgerSource { message } => {
                details = details.with_detail(serde_json::json!({ "source_message": message }));
                details = details.with_suggestion(
                    "Statistics are shown as zero until the ledger store is reachable.".to_string()
                );
            }
            _ => {}
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Error context for reporting
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Operation being performed
    pub operation: String,
    /// Scope the operation ran in (e.g. organization)
    pub scope: Option<String>,
    /// Additional context data
    pub data: serde_json::Value,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            scope: None,
            data: serde_json::json!({}),
        }
    }

    /// Add scope
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Add context data
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data[key] = value;
        self
    }
}

/// Error logger trait
pub trait ErrorLogger: Send + Sync {
    /// Log an error
    fn log_error(&self, error: &CoreError, context: &ErrorContext);
    /// Log a warning
    fn log_warning(&self, message: &str, context: &ErrorContext);
}

/// Default error logger using log crate
#[derive(Debug, Default)]
pub struct DefaultErrorLogger;

impl ErrorLogger for DefaultErrorLogger {
    fn log_error(&self, error: &CoreError, context: &ErrorContext) {
        log::error!(
            target: "ledgertree::error",
            "ERROR [{}] {} - Operation: {} - Scope: {:?} - Data: {}",
            error.code(),
            error,
            context.operation,
            context.scope,
            context.data
        );
    }

    fn log_warning(&self, message: &str, context: &ErrorContext) {
        log::warn!(
            target: "ledgertree::error",
            "WARNING: {} - Operation: {} - Scope: {:?}",
            message,
            context.operation,
            context.scope
        );
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NotLoaded.to_string(), "NOT_LOADED");
        assert_eq!(ErrorCode::AccountNotFound.to_string(), "ACCOUNT_NOT_FOUND");
        assert_eq!(ErrorCode::InvalidMove.to_string(), "INVALID_MOVE");
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::LedgerSourceError).unwrap();
        assert_eq!(json, "\"LEDGER_SOURCE_ERROR\"");
    }

    #[test]
    fn test_core_error_code_and_severity() {
        let error = CoreError::AccountNotFound { id: "A".to_string() };
        assert_eq!(error.code(), ErrorCode::AccountNotFound);
        assert_eq!(error.severity(), ErrorSeverity::Info);

        let error = CoreError::InternalError { message: "bad".to_string() };
        assert_eq!(error.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_invalid_move_message_joins_errors() {
        let error = CoreError::InvalidMove {
            errors: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(error.to_string(), "Invalid move: first; second");
        let details = error.to_details();
        assert!(details.details.is_some());
        assert!(!details.suggestions.is_empty());
    }

    #[test]
    fn test_delete_refused_details() {
        let error = CoreError::DeleteRefused {
            id: "A".to_string(),
            reason: "balance is 10".to_string(),
        };
        let details = error.to_details();
        assert_eq!(details.code, ErrorCode::DeleteRefused);
        assert!(details.message.contains("A"));
        assert!(details.to_string().contains("Suggestions:"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("compute_statistics")
            .with_scope(Some("org-1".to_string()))
            .with_data("nodes", serde_json::json!(5));

        assert_eq!(context.operation, "compute_statistics");
        assert_eq!(context.scope.as_deref(), Some("org-1"));
        assert_eq!(context.data["nodes"], 5);
    }
}
