//! Error types for kb
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (validation failure, unknown task or column, bad args)
//! - 4: Operation failed (I/O, serialization, lock contention)
//!
//! Malformed persisted data and malformed import rows are recovered inside
//! the library and only surface here so they can be reported.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the kb CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for kb operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Invalid due date '{0}' (expected YYYY-MM-DD)")]
    InvalidDueDate(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Recovered locally, reported to the user
    #[error("Malformed persisted data: {0}")]
    MalformedPersistedData(String),

    #[error("Malformed import row at line {line}: {reason}")]
    MalformedImportRow { line: usize, reason: String },

    /// Stored bytes that are not UTF-8; `lossy` keeps a readable copy
    #[error("Stored value is not valid UTF-8: {reason}")]
    InvalidUtf8 { reason: String, lossy: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EmptyTitle
            | Error::InvalidDueDate(_)
            | Error::NotFound(_)
            | Error::UnknownColumn(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::MalformedImportRow { .. } => exit_codes::USER_ERROR,

            Error::MalformedPersistedData(_)
            | Error::InvalidUtf8 { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Whether this error is a validation rejection from the editor surface.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyTitle | Error::InvalidDueDate(_))
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::UnknownColumn(status) => Some(serde_json::json!({ "status": status })),
            Error::InvalidDueDate(value) => Some(serde_json::json!({ "value": value })),
            Error::MalformedImportRow { line, reason } => {
                Some(serde_json::json!({ "line": line, "reason": reason }))
            }
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for kb operations
pub type Result<T> = std::result::Result<T, Error>;
