//! Error types for the ragent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Tool plugins have no error type on purpose: every plugin outcome is a
//! `ToolCallResult`, see [`crate::tool`].

use thiserror::Error;

/// Failures of the model gateway. All of them are fatal to the current turn.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by model provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed model output: {0}")]
    Malformed(String),

    #[error("Model gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval service unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}
