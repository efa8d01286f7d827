//! # Error Types
//!
//! Domain-specific error types for hyperlocal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  hyperlocal-core errors (this file)                                    │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── LocationError    - Geolocation failure taxonomy                   │
//! │                                                                         │
//! │  hyperlocal-client errors (separate crate)                             │
//! │  ├── StorageError     - Swallowed at the storage boundary              │
//! │  └── ClientError      - What controllers and callers see               │
//! │                                                                         │
//! │  Flow: LocationError → LocationStatus::Error (controller state)        │
//! │        ApiError      → ClientError::{Unauthorized, Network}            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A role string did not name one of the known roles.
    #[error("Unknown user role: {0}")]
    UnknownRole(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before a request leaves the client.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email or phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Location Error
// =============================================================================

/// Why a location could not be obtained.
///
/// ## Taxonomy
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Platform signal                     →  LocationError                   │
/// │  ───────────────────────────────────    ──────────────────────────────  │
/// │  no geolocation capability           →  Unsupported                     │
/// │  code 1 (PERMISSION_DENIED)          →  PermissionDenied                │
/// │  permission query not "granted"      →  PermissionDenied                │
/// │  code 2 (POSITION_UNAVAILABLE)       →  PositionUnavailable             │
/// │  code 3 (TIMEOUT) / local timeout    →  Timeout                         │
/// │  anything else                       →  Unavailable                     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// The `Display` text is the human-readable message shown by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The platform has no geolocation capability.
    #[error("Geolocation is not supported by this browser")]
    Unsupported,

    /// The user (or platform policy) refused access.
    #[error("{0}")]
    PermissionDenied(String),

    /// A fix could not be determined.
    #[error("Location information unavailable")]
    PositionUnavailable,

    /// No fix arrived within the configured timeout.
    #[error("Location request timed out")]
    Timeout,

    /// Any other platform failure.
    #[error("{0}")]
    Unavailable(String),
}

impl LocationError {
    /// Permission refused at the platform prompt.
    pub fn access_denied() -> Self {
        LocationError::PermissionDenied("Location access denied by user".to_string())
    }

    /// Permission check came back negative before any fix was attempted.
    pub fn permission_not_granted() -> Self {
        LocationError::PermissionDenied("Location permission denied".to_string())
    }

    /// Generic one-shot failure.
    pub fn unable_to_get() -> Self {
        LocationError::Unavailable("Unable to get location".to_string())
    }

    /// Generic watch failure.
    pub fn unable_to_watch() -> Self {
        LocationError::Unavailable("Unable to watch location".to_string())
    }

    /// Returns the taxonomy bucket, without the message.
    pub fn kind(&self) -> LocationErrorKind {
        match self {
            LocationError::Unsupported => LocationErrorKind::Unsupported,
            LocationError::PermissionDenied(_) => LocationErrorKind::PermissionDenied,
            LocationError::PositionUnavailable => LocationErrorKind::PositionUnavailable,
            LocationError::Timeout => LocationErrorKind::Timeout,
            LocationError::Unavailable(_) => LocationErrorKind::Unavailable,
        }
    }
}

/// Message-free variant of [`LocationError`], used in controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LocationErrorKind {
    Unsupported,
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unavailable,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_error_messages() {
        assert_eq!(
            LocationError::access_denied().to_string(),
            "Location access denied by user"
        );
        assert_eq!(
            LocationError::PositionUnavailable.to_string(),
            "Location information unavailable"
        );
        assert_eq!(LocationError::Timeout.to_string(), "Location request timed out");
        assert_eq!(
            LocationError::Unsupported.to_string(),
            "Geolocation is not supported by this browser"
        );
        assert_eq!(LocationError::unable_to_get().to_string(), "Unable to get location");
    }

    #[test]
    fn test_location_error_kind() {
        assert_eq!(
            LocationError::permission_not_granted().kind(),
            LocationErrorKind::PermissionDenied
        );
        assert_eq!(LocationError::access_denied().kind(), LocationErrorKind::PermissionDenied);
        assert_eq!(LocationError::unable_to_watch().kind(), LocationErrorKind::Unavailable);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::OutOfRange {
            field: "latitude".to_string(),
            min: -90.0,
            max: 90.0,
        };
        assert_eq!(err.to_string(), "latitude must be between -90 and 90");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
