//! # Centralized Error Handling
//!
//! This module defines the application-wide error type [`AppError`] used consistently
//! across the session library and the client. It follows the `thiserror` pattern.
//!
//! ## Error Categories
//!
//! 1. **Remote failures** - the backend could not be reached or answered badly
//!    - [`Api`](AppError::Api): network, HTTP status, malformed responses
//!    - [`Auth`](AppError::Auth): the identity provider rejected the request
//!    - [`NotFound`](AppError::NotFound): a keyed read found no row (e.g. profile not materialized yet)
//!
//! 2. **Local failures**
//!    - [`Config`](AppError::Config): startup configuration
//!    - [`Storage`](AppError::Storage): durable key/value store I/O
//!    - [`Decoding`](AppError::Decoding): JSON that does not match the expected shape
//!    - [`Internal`](AppError::Internal): unexpected failures
//!
//! 3. **User input**
//!    - [`Validation`](AppError::Validation): form input rejected before any request
//!
//! The session manager absorbs every one of these into a defined auth state;
//! only the explicit sign-in/sign-up flows surface them to callers.
//!
//! ## Usage Example
//!
//! ```rust
//! use lib_core::error::{AppError, Result};
//!
//! fn require_email(email: Option<&str>) -> Result<&str> {
//!     email.ok_or_else(|| AppError::Validation("Email is required".to_string()))
//! }
//! ```

use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-wide error type covering all error scenarios.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error during startup or environment loading.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend communication error (network, HTTP status, unparseable response).
    #[error("API error: {0}")]
    Api(String),

    /// The identity provider rejected the request (bad credentials, expired session).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable key/value store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Data decoding error (JSON shape mismatch).
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Invalid user input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error (unexpected failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get a user-friendly error message.
    ///
    /// Messages that come from the user's own input or from the provider's
    /// rejection are passed through; local and transport failures get a generic text.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Auth(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::Api(_) => "Service temporarily unavailable".to_string(),
            AppError::Config(_)
            | AppError::Storage(_)
            | AppError::Decoding(_)
            | AppError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Whether this error means "the row does not exist" rather than a failure to look.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decoding(format!("JSON error: {}", err))
    }
}

/// Convert `std::io::Error` to `AppError`.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Validation(msg)
    }
}
