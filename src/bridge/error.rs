//! Error types for the bridge. None of these carry credential material; transport
//! messages are built from status codes and sanitized bodies only.

use thiserror::Error;

/// Failures of the durable credential slot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures surfaced by `AuthTransport`.
///
/// `Unauthorized` is passed through unchanged after the transport has already
/// cleared the credential, so callers can still tell a validation 401 apart from a
/// 401 on an ordinary API call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request was not authorized (401)")]
    Unauthorized,
    #[error("unable to reach the server: {0}")]
    Unreachable(String),
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// Whether this failure says nothing about the credential (network, timeout,
    /// malformed response, server error).
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Decode(_) | Self::Client(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized => false,
        }
    }
}

/// Invalid bridge configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
    #[error("{name} must be an http(s) origin, got {value}")]
    NotHttp { name: &'static str, value: String },
    #[error("unknown credential variant: {0} (expected cookie or bearer)")]
    Variant(String),
}
