//! Connection state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable state of a connection or session.
///
/// ```text
/// disconnected ──connect()──► connecting ──handshake ok──► connected
///      ▲                          │                           │
///      │                   handshake failed              transport closed
///      │                          ▼                           │
///      └──────── backoff ────── error ◄───────────────────────┘ (→ disconnected)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport opening or handshake in flight.
    Connecting,
    /// Handshake succeeded; calls are accepted.
    Connected,
    /// The last attempt failed. Terminal for that attempt.
    Error,
}

impl ConnectionState {
    /// Returns `true` if calls are accepted.
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Returns `true` if the connection has ended (`disconnected` or `error`).
    #[inline]
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Returns the lowercase wire name.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
