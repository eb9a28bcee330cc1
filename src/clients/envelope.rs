//! Response shapes returned by the request engine.
//!
//! Every partner API call resolves to exactly one of two shapes:
//!
//! - [`Envelope`]: the uniform wrapper the partner API returns for every
//!   call it answered. An empty `error` means business success; a non-empty
//!   one is a business error that this layer never retries.
//! - [`TransportError`]: the call never produced a usable envelope (network
//!   failure, non-2xx status, exhausted auth or rate-limit budget).
//!
//! [`CallOutcome`] tags the two so callers match on them instead of probing
//! fields.
//!
//! # Example
//!
//! ```rust,ignore
//! match engine.send(request).await {
//!     CallOutcome::Success(envelope) => {
//!         let payload = envelope.into_response()?;
//!     }
//!     CallOutcome::Transport(err) if err.kind == TransportErrorKind::TooManyRequests => {
//!         // the 600 second wait budget was spent
//!     }
//!     CallOutcome::Transport(err) => return Err(err.into()),
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The uniform partner API response wrapper.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Business error code; empty on success.
    #[serde(default)]
    pub error: String,
    /// Human-readable message accompanying `error`.
    #[serde(default)]
    pub message: String,
    /// Optional non-fatal warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Server-side request identifier.
    #[serde(default)]
    pub request_id: String,
    /// Endpoint-specific payload.
    #[serde(default)]
    pub response: serde_json::Value,
    /// Optional debugging detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
}

impl Envelope {
    /// Returns `true` if the envelope carries no business error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Validates the envelope and returns its payload.
    ///
    /// A warning, if present, is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BusinessError`] if `error` is non-empty.
    pub fn into_response(self) -> Result<serde_json::Value, BusinessError> {
        if let Some(warning) = self.warning.as_deref().filter(|w| !w.is_empty()) {
            tracing::warn!(request_id = %self.request_id, warning, "partner API warning");
        }
        if self.is_success() {
            return Ok(self.response);
        }
        Err(BusinessError {
            error: self.error,
            message: self.message,
            request_id: self.request_id,
        })
    }
}

/// A 2xx response whose envelope reported a business error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("partner API error '{error}': {message} (request_id: {request_id})")]
pub struct BusinessError {
    /// Business error code.
    pub error: String,
    /// Message from the envelope.
    pub message: String,
    /// Server-side request identifier.
    pub request_id: String,
}

/// Classification of a transport-layer failure.
///
/// Serializes to the upper-case code carried in [`TransportError::kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportErrorKind {
    /// More than three consecutive 401/403 responses.
    AuthError,
    /// Cumulative rate-limit waiting would exceed the wait budget.
    TooManyRequests,
    /// Any other non-2xx HTTP status.
    HttpError,
    /// Connection, TLS or timeout failure before a status was received.
    NetworkError,
    /// A 2xx response whose body was not an envelope.
    InvalidResponse,
    /// The token refresh triggered by an auth failure itself failed.
    TokenRefreshFailed,
}

impl TransportErrorKind {
    /// Returns the wire code for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthError => "AUTH_ERROR",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::HttpError => "HTTP_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-layer failure.
///
/// Serializes to `{ok: false, status?, error, message, response}`.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Always `false`; distinguishes this shape from an [`Envelope`].
    pub ok: bool,
    /// HTTP status, when one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure classification.
    #[serde(rename = "error")]
    pub kind: TransportErrorKind,
    /// Description of the failure.
    pub message: String,
    /// Last response body received, or `null`.
    #[serde(default)]
    pub response: serde_json::Value,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(
        kind: TransportErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self {
            ok: false,
            status,
            kind,
            message: message.into(),
            response,
        }
    }
}

/// The result of one engine call: exactly one of an envelope or a
/// transport failure.
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome {
    /// The partner API answered with an envelope.
    Success(Envelope),
    /// The call failed below the business layer.
    Transport(TransportError),
}

impl CallOutcome {
    /// Returns the envelope, if the call succeeded at the transport layer.
    #[must_use]
    pub const fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Success(envelope) => Some(envelope),
            Self::Transport(_) => None,
        }
    }

    /// Returns the transport error, if any.
    #[must_use]
    pub const fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Success(_) => None,
            Self::Transport(error) => Some(error),
        }
    }

    /// Converts into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] if the call failed.
    pub fn into_result(self) -> Result<Envelope, TransportError> {
        match self {
            Self::Success(envelope) => Ok(envelope),
            Self::Transport(error) => Err(error),
        }
    }
}
