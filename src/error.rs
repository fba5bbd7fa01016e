//! Error types for the gateway RPC client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use gateway_rpc::{Error, Result};
//!
//! async fn example(session: &GatewaySession) -> Result<()> {
//!     match session.send_request("agent.status", &json!({})).await {
//!         Ok(payload) => println!("{payload}"),
//!         Err(e) if e.is_timeout() => println!("no answer"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionLost`], [`Error::NotConnected`], [`Error::ReconnectExhausted`] |
//! | Handshake | [`Error::HandshakeRejected`], [`Error::HandshakeTimeout`], [`Error::HandshakeMalformed`], [`Error::ProtocolMismatch`] |
//! | Call | [`Error::RequestTimeout`], [`Error::Remote`], [`Error::TooManyPending`] |
//! | External | [`Error::Protocol`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// RemoteError
// ============================================================================

/// Error value carried by a `response` frame with `success: false`.
///
/// The gateway may send a plain string or an object. The value is kept
/// exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError(Value);

impl RemoteError {
    /// Wraps the raw error value from a response frame.
    #[inline]
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw error value.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the error and returns the raw value.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns the error code, when the gateway sent an object with a
    /// string `code` field.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.0.get("code").and_then(Value::as_str)
    }

    /// Returns a human-readable message.
    ///
    /// Strings are returned as-is, objects contribute their `message` field,
    /// anything else is rendered as JSON.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.0 {
            Value::Null => "unknown error".to_string(),
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| other.to_string(), str::to_string),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<Value> for RemoteError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when [`GatewayConfig`](crate::GatewayConfig) validation fails.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a call.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport did not open within the connect timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection dropped while the call was pending.
    ///
    /// Every pending call is rejected with this error on the transition
    /// to `disconnected`.
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Why the connection ended.
        reason: String,
    },

    /// Call issued while the connection was not in `connected` state.
    ///
    /// Nothing was sent.
    #[error("Gateway not connected")]
    NotConnected,

    /// Reconnection gave up after the configured number of attempts.
    #[error("Reconnect gave up after {attempts} attempts")]
    ReconnectExhausted {
        /// Consecutive failed attempts.
        attempts: u32,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Gateway rejected the `connect` handshake (bad token, unsupported
    /// protocol, ...).
    #[error("Handshake rejected: {error}")]
    HandshakeRejected {
        /// Error value sent by the gateway.
        error: RemoteError,
    },

    /// Gateway did not answer the handshake in time.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Gateway accepted the handshake but its `hello-ok` payload could not
    /// be read.
    #[error("Malformed handshake reply: {message}")]
    HandshakeMalformed {
        /// Why the payload was rejected.
        message: String,
    },

    /// Gateway accepted the handshake but selected a protocol version
    /// outside the offered range.
    #[error("Protocol mismatch: offered {min}..={max}, gateway selected {selected}")]
    ProtocolMismatch {
        /// Lowest offered version.
        min: u32,
        /// Highest offered version.
        max: u32,
        /// Version the gateway answered with.
        selected: u32,
    },

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// No response arrived within the call's timeout.
    #[error("Request {request_id} ({method}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Method that was called.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Gateway answered with `success: false`.
    #[error("{method} failed: {error}")]
    Remote {
        /// Method that was called.
        method: String,
        /// Error value sent by the gateway, verbatim.
        error: RemoteError,
    },

    /// Pending-call table is full.
    #[error("Too many pending requests (limit {limit})")]
    TooManyPending {
        /// Configured table capacity.
        limit: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Protocol violation.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a connection lost error.
    #[inline]
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a handshake rejected error.
    #[inline]
    pub fn handshake_rejected(error: impl Into<RemoteError>) -> Self {
        Self::HandshakeRejected {
            error: error.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a malformed handshake reply error.
    #[inline]
    pub fn handshake_malformed(message: impl Into<String>) -> Self {
        Self::HandshakeMalformed {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(
        request_id: RequestId,
        method: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self::RequestTimeout {
            request_id,
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a remote business error.
    #[inline]
    pub fn remote(method: impl Into<String>, error: impl Into<RemoteError>) -> Self {
        Self::Remote {
            method: method.into(),
            error: error.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::HandshakeTimeout { .. }
                | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the gateway explicitly failed the call.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this is a handshake error.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Self::HandshakeRejected { .. }
                | Self::HandshakeTimeout { .. }
                | Self::HandshakeMalformed { .. }
                | Self::ProtocolMismatch { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionLost { .. }
                | Self::NotConnected
                | Self::ReconnectExhausted { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed if the caller retries later.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::ConnectionLost { .. }
                | Self::NotConnected
                | Self::RequestTimeout { .. }
                | Self::HandshakeTimeout { .. }
                | Self::TooManyPending { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
