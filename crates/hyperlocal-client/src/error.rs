//! # Client Error Types
//!
//! Error types for the I/O layer.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Domain              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Unauthorized   │  │  Location               │ │
//! │  │  InvalidUrl     │  │  Network        │  │  Validation             │ │
//! │  │  ConfigLoad/Save│  │  Decode         │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  StorageError never reaches a controller: AppStorage logs it and       │
//! │  degrades to absent/no-op. Only the raw backends return it.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use hyperlocal_core::{ApiError, LocationError, ValidationError};
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for raw storage backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Client Error
// =============================================================================

/// Everything a caller of the client layer can observe.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The backend answered 401. The global sign-out has already run by the
    /// time the caller sees this.
    #[error("Unauthorized: {}", .0.message)]
    Unauthorized(ApiError),

    /// Any other failed request, normalized. Covers non-2xx responses as well
    /// as requests that never got a response (status 500).
    #[error("{}", .0.message)]
    Network(ApiError),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Geolocation failed.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Input rejected before any request was made.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Raw storage failure (only from backends used directly).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// A service URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl ClientError {
    /// The normalized backend error, for transport failures.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Unauthorized(err) | ClientError::Network(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of a transport failure.
    pub fn status(&self) -> Option<u16> {
        self.api_error().map(|err| err.status)
    }

    /// Returns true if the backend rejected the token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

// =============================================================================
// Storage Error
// =============================================================================

/// Failure of a raw [`crate::storage::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend refused the write because it is full.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// The backend is disabled or unreachable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A slot held text that is not valid JSON for the requested type.
    #[error("Malformed stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return ClientError::HttpClient(err.to_string());
        }
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        let status = err.status().map(|s| s.as_u16()).unwrap_or(500);
        ClientError::Network(ApiError::new(status, err.to_string()))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_accessors() {
        let err = ClientError::Unauthorized(ApiError::new(401, "Token expired"));
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Unauthorized: Token expired");

        let err = ClientError::Network(ApiError::new(503, "Service unavailable"));
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "Service unavailable");
    }

    #[test]
    fn test_location_error_is_transparent() {
        let err: ClientError = LocationError::Timeout.into();
        assert_eq!(err.to_string(), "Location request timed out");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_config_errors() {
        assert!(ClientError::InvalidConfig("x".into()).is_config_error());
        assert!(ClientError::InvalidUrl("x".into()).is_config_error());
        assert!(!ClientError::Decode("x".into()).is_config_error());
    }
}
