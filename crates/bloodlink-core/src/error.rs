use thiserror::Error;

/// Core error types for BloodLink domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid blood type: {0}")]
    InvalidBloodType(String),

    #[error("Invalid urgency level: {0}")]
    InvalidUrgency(String),

    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Search radius {0} km is out of bounds")]
    RadiusOutOfBounds(f64),

    #[error("Description exceeds {max} characters (got {actual})")]
    DescriptionTooLong { max: usize, actual: usize },

    #[error("Quantity must be at least 1 unit")]
    InvalidQuantity,

    #[error("Invalid alert status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),
}

impl CoreError {
    /// Create a new InvalidBloodType error
    pub fn invalid_blood_type(value: impl Into<String>) -> Self {
        Self::InvalidBloodType(value.into())
    }

    /// Create a new InvalidUrgency error
    pub fn invalid_urgency(value: impl Into<String>) -> Self {
        Self::InvalidUrgency(value.into())
    }

    /// Create a new InvalidCoordinates error
    pub fn invalid_coordinates(latitude: f64, longitude: f64) -> Self {
        Self::InvalidCoordinates {
            latitude,
            longitude,
        }
    }

    /// Create a new InvalidTransition error
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Check if this error is a client error (bad input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBloodType(_)
                | Self::InvalidUrgency(_)
                | Self::InvalidCoordinates { .. }
                | Self::RadiusOutOfBounds(_)
                | Self::DescriptionTooLong { .. }
                | Self::InvalidQuantity
                | Self::InvalidTransition { .. }
                | Self::JsonError(_)
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidBloodType(_)
            | Self::InvalidUrgency(_)
            | Self::InvalidCoordinates { .. }
            | Self::RadiusOutOfBounds(_)
            | Self::DescriptionTooLong { .. }
            | Self::InvalidQuantity => ErrorCategory::Validation,
            Self::InvalidTransition { .. } => ErrorCategory::State,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::UuidError(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    State,
    Serialization,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::State => write!(f, "state"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_blood_type("C+");
        assert_eq!(err.to_string(), "Invalid blood type: C+");
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_transition_error() {
        let err = CoreError::invalid_transition("cancelled", "fulfilled");
        assert_eq!(
            err.to_string(),
            "Invalid alert status transition: cancelled -> fulfilled"
        );
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn test_radius_error_message() {
        let err = CoreError::RadiusOutOfBounds(75.0);
        assert!(err.to_string().contains("75"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
        let core_err: CoreError = json_err.into();

        assert!(matches!(core_err, CoreError::JsonError(_)));
        assert_eq!(core_err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_uuid_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("not-a-uuid").unwrap_err();
        let core_err: CoreError = uuid_err.into();

        assert!(matches!(core_err, CoreError::UuidError(_)));
        assert!(!core_err.is_client_error());
        assert_eq!(core_err.category(), ErrorCategory::System);
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::State.to_string(), "state");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::System.to_string(), "system");
    }
}
