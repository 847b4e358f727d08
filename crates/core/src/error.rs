//! Error types for the Tidbit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Tidbit operations.
///
/// Only `Config`, `Backend`, and `Parse` are ever surfaced to the user;
/// auxiliary-data failures (`SourceError`) are recovered as empty context
/// blocks and never reach this type during generation.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Backend (transport) errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Parse failures ---
    #[error("Could not parse a fact list from the model output (starts with: {preview:?})")]
    Parse { preview: String },

    // --- Settings store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a parse-failure error carrying a bounded prefix of the raw
    /// model output for diagnosis.
    pub fn parse_failure(raw: &str) -> Self {
        let preview: String = raw.chars().take(300).collect();
        Self::Parse { preview }
    }
}

// --- Bounded context errors ---

/// Errors from a completion backend call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from an auxiliary data provider (persona, character, lore).
///
/// These never surface to the user: the context assembler recovers by
/// treating the failed block as empty and logging the cause.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),
}

/// Errors from the host settings store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persist failed: {0}")]
    PersistFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn parse_failure_truncates_preview() {
        let raw = "x".repeat(1000);
        let err = Error::parse_failure(&raw);
        match err {
            Error::Parse { preview } => assert_eq!(preview.len(), 300),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn parse_failure_preview_is_char_safe() {
        // Multi-byte characters must not split
        let raw = "ü".repeat(400);
        let err = Error::parse_failure(&raw);
        match err {
            Error::Parse { preview } => assert_eq!(preview.chars().count(), 300),
            _ => panic!("Expected Parse error"),
        }
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "no connection profile selected".into(),
        };
        assert!(err.to_string().contains("no connection profile"));
    }
}
