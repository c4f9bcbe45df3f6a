use thiserror::Error;

use bloodlink_core::CoreError;
use bloodlink_storage::StorageError;

/// Errors raised by engine operations.
///
/// Validation and state errors abort the requested transition with no
/// partial mutation. Dispatch/transport failures are never represented
/// here; they are recovered into the returned `DispatchSummary` and the
/// notification log.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// Referenced alert/actor/facility does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Attempted transition from a terminal or wrong state.
    #[error("Invalid alert state: {message}")]
    InvalidState { message: String },

    /// Donor blood type mismatch or facility already offered the alert.
    #[error("Incompatible: {message}")]
    Incompatible { message: String },

    /// Role-inappropriate action for the authenticated actor.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Persistence failure, including update-retry exhaustion.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::Incompatible {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    pub fn is_incompatible(&self) -> bool {
        matches!(self, Self::Incompatible { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}
