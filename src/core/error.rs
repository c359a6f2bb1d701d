use rusqlite::ErrorCode;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KipsError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("Constraint violation: {0}")]
    ConstraintError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl KipsError {
    /// Classify an engine error, splitting constraint violations off from
    /// connectivity and engine failures.
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            KipsError::ConstraintError(err.to_string())
        } else {
            KipsError::RusqliteError(err)
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, KipsError::ConstraintError(_))
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        KipsError::ParseError {
            line,
            message: message.into(),
        }
    }
}
