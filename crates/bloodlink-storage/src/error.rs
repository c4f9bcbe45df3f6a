//! Storage error types for the persistence abstraction layer.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {kind}/{id}")]
    NotFound {
        /// The kind of record that was not found (alert, actor, facility…).
        kind: String,
        /// The id of the record that was not found.
        id: String,
    },

    /// A version conflict occurred during an update operation.
    ///
    /// The caller read version `expected` but the stored record has moved to
    /// `actual`; re-fetch and retry.
    #[error("Version conflict on alert {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Attempted to insert a record that already exists.
    #[error("Record already exists: {kind}/{id}")]
    AlreadyExists { kind: String, id: String },

    /// An internal storage error occurred.
    #[error("Internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } | Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("alert", "123");
        assert_eq!(err.to_string(), "Record not found: alert/123");

        let err = StorageError::version_conflict("a1", 1, 2);
        assert_eq!(
            err.to_string(),
            "Version conflict on alert a1: expected 1, found 2"
        );

        let err = StorageError::already_exists("alert", "456");
        assert_eq!(err.to_string(), "Record already exists: alert/456");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("alert", "123");
        assert!(err.is_not_found());
        assert!(!err.is_version_conflict());

        let err = StorageError::version_conflict("a1", 1, 2);
        assert!(!err.is_not_found());
        assert!(err.is_version_conflict());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("alert", "123").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::version_conflict("a1", 1, 2).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::internal("backend down").category(),
            ErrorCategory::Internal
        );
    }
}
