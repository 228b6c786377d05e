//! Structured error types surfaced at the application boundary.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No verified identity attached to the request.
    Unauthenticated,
    /// Authenticated but lacking the required grant or role.
    Forbidden,
    /// Target does not exist, or exists but is hidden from the caller.
    /// Deliberately indistinguishable so existence never leaks.
    NotFound,
    /// Constraint violation (duplicate email, missing fallback category).
    Conflict,
    InvalidValue,
    DatabaseError,
    InternalError,
}

/// Structured error carried through `anyhow` and recovered at the boundary.
#[derive(Debug, Serialize)]
pub struct BoardError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl BoardError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "Authentication required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", kind, id))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidValue, format!("{}: {}", field, reason))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BoardError {}

// Allow recovering the structured error from an anyhow chain at the boundary.
impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<BoardError>() {
            Ok(board_err) => board_err,
            Err(err) => BoardError::internal(err),
        }
    }
}

/// Result type for boundary-facing operations.
pub type BoardResult<T> = std::result::Result<T, BoardError>;

/// The error code buried in an `anyhow` chain, if any.
pub fn code_of(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<BoardError>().map(|e| e.code)
}
