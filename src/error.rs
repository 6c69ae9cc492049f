//! Protocol error taxonomy.
//!
//! Every failure that can cross a component boundary is a [`ProtocolError`]:
//! a typed code, a human readable message and optional structured data.
//! Witness-side failures are never thrown across the wire; they travel inside
//! a signed response envelope (see `wire::ClaimTunnelResponse`).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Error classes produced by the claim protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Malformed or inconsistent input, detectable without cryptography.
    #[serde(rename = "ERROR_BAD_REQUEST")]
    BadRequest,

    /// Cryptographic or semantic mismatch.
    #[serde(rename = "ERROR_INVALID_CLAIM")]
    InvalidClaim,

    /// Owner or request signature invalid.
    #[serde(rename = "ERROR_AUTHENTICATION_FAILED")]
    AuthenticationFailed,

    /// Transient transport failure.
    #[serde(rename = "ERROR_NETWORK_ERROR")]
    NetworkError,

    /// Unexpected or programming error.
    #[serde(rename = "ERROR_INTERNAL")]
    Internal,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "ERROR_BAD_REQUEST",
            Self::InvalidClaim => "ERROR_INVALID_CLAIM",
            Self::AuthenticationFailed => "ERROR_AUTHENTICATION_FAILED",
            Self::NetworkError => "ERROR_NETWORK_ERROR",
            Self::Internal => "ERROR_INTERNAL",
        }
    }

    /// Whether a top-level claim attempt failing with this code may be retried.
    ///
    /// Only transport failures qualify. Semantic rejections would fail again
    /// with the same inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed error carried locally and inside response envelopes.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProtocolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data to the error.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn invalid_claim(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClaim, message)
    }

    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}
