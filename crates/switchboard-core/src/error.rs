//! Error types for switchboard operations.
//!
//! Every fallible operation returns [`SwitchboardResult`]. A lookup that
//! matches nothing is never an error; stores report it as `None`.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for switchboard operations.
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;

/// Main error type for all switchboard operations.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// A required collaborator or record does not exist.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        id: Option<String>,
    },

    /// The backend does not implement the requested store operation.
    #[error("Operation '{operation}' is not implemented by the {backend} backend")]
    NotImplemented {
        operation: &'static str,
        backend: String,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidIdentifier,
    ValMalformedCondition,
    ValReservedField,

    // Lookups (NF_xxx)
    NfItem,
    NfConditionSet,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbTransactionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidValue,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidIdentifier => "VAL_003",
            ErrorCode::ValMalformedCondition => "VAL_004",
            ErrorCode::ValReservedField => "VAL_005",
            ErrorCode::NfItem => "NF_001",
            ErrorCode::NfConditionSet => "NF_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbTransactionFailed => "DB_003",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidValue => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl SwitchboardError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for an invalid SQL identifier.
    pub fn invalid_identifier(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut details = HashMap::new();
        details.insert("identifier".to_string(), name.clone());
        Self::Validation {
            message: format!("'{}' is not a valid table name", name),
            code: ErrorCode::ValInvalidIdentifier,
            details,
            suggestion: Some("Use letters, digits and underscores only".to_string()),
        }
    }

    /// Create a validation error for a condition payload of the wrong type.
    pub fn malformed_condition(found: &serde_json::Value) -> Self {
        let mut details = HashMap::new();
        details.insert("found".to_string(), found.to_string());
        Self::Validation {
            message: "conditions must be strings".to_string(),
            code: ErrorCode::ValMalformedCondition,
            details,
            suggestion: Some("Serialize the condition to a string before adding it".to_string()),
        }
    }

    /// Create a validation error for metadata shadowing a reserved field.
    pub fn reserved_field(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut details = HashMap::new();
        details.insert("field".to_string(), name.clone());
        Self::Validation {
            message: format!("'{}' is reserved and cannot be used as version metadata", name),
            code: ErrorCode::ValReservedField,
            details,
            suggestion: Some("Rename the metadata key".to_string()),
        }
    }

    /// Create a not found error for an item.
    pub fn not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::NotFound {
            message: format!("Item with id '{}' not found", id),
            code: ErrorCode::NfItem,
            id: Some(id),
        }
    }

    /// Create a not found error for a condition set.
    pub fn unknown_condition_set(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::NotFound {
            message: format!("No condition set registered with id '{}'", id),
            code: ErrorCode::NfConditionSet,
            id: Some(id),
        }
    }

    /// Create a not implemented error.
    pub fn not_implemented(operation: &'static str, backend: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation,
            backend: backend.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Wrap a failure that aborted a transaction.
    pub fn transaction(err: SwitchboardError) -> Self {
        Self::Database {
            message: format!("transaction rolled back: {}", err),
            code: ErrorCode::DbTransactionFailed,
            source: Some(Box::new(err)),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidValue,
        }
    }

    /// Create an internal error for a poisoned lock.
    pub fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{} lock poisoned", what))
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error reports a backend missing an operation.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound {
                code: ErrorCode::NfConditionSet,
                ..
            } => Some("Register the condition set with the provider before using it"),
            Self::NotImplemented { .. } => Some("Use a backend that implements the full store contract"),
            Self::Database { .. } => Some("Please check your database path and permissions"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SwitchboardError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
