//! Error types for illume.

use thiserror::Error;

/// Result type alias using illume's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for illume operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No verified caller identity
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found or not owned by the caller
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// External provider failed: missing credential, non-2xx response,
    /// or malformed response shape. Recovered locally by the fallback chain.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider rejected the request for lack of credits (HTTP 402).
    /// Distinguished from ProviderUnavailable for fallback styling.
    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    /// Object storage rejected a write or URL retrieval. Fatal for the
    /// current generation task; there is no fallback beneath storage.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Daily generation cap reached for the caller
    #[error("Rate limited: {used} of {limit} daily generations used")]
    RateLimited { used: i64, limit: i64 },

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a recoverable provider failure that the
    /// generation pipeline absorbs via the fallback generator.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_) | Error::InsufficientCredits(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_note_not_found() {
        let id = Uuid::nil();
        let err = Error::NoteNotFound(id);
        assert_eq!(err.to_string(), format!("Note not found: {}", id));
    }

    #[test]
    fn test_error_display_unauthenticated() {
        let err = Error::Unauthenticated("missing identity header".to_string());
        assert_eq!(
            err.to_string(),
            "Unauthenticated: missing identity header"
        );
    }

    #[test]
    fn test_error_display_provider_unavailable() {
        let err = Error::ProviderUnavailable("status 503".to_string());
        assert_eq!(err.to_string(), "Provider unavailable: status 503");
    }

    #[test]
    fn test_error_display_insufficient_credits() {
        let err = Error::InsufficientCredits("status 402".to_string());
        assert_eq!(err.to_string(), "Insufficient credits: status 402");
    }

    #[test]
    fn test_error_display_rate_limited() {
        let err = Error::RateLimited { used: 50, limit: 50 };
        assert_eq!(
            err.to_string(),
            "Rate limited: 50 of 50 daily generations used"
        );
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("write rejected".to_string());
        assert_eq!(err.to_string(), "Storage error: write rejected");
    }

    #[test]
    fn test_is_provider_failure() {
        assert!(Error::ProviderUnavailable("x".into()).is_provider_failure());
        assert!(Error::InsufficientCredits("x".into()).is_provider_failure());
        assert!(!Error::Storage("x".into()).is_provider_failure());
        assert!(!Error::RateLimited { used: 1, limit: 1 }.is_provider_failure());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
