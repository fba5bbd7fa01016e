//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep request IDs and connection IDs from being mixed
//! with each other or with arbitrary strings.
//!
//! | Type | Wire form | Source |
//! |------|-----------|--------|
//! | [`RequestId`] | `"req-42"`, `"connect-7"` | Process-wide counter |
//! | [`ConnectionId`] | not sent | UUID v4, used in logs |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Process-wide request counter.
///
/// Shared by every connection so an ID is never reused across reconnects.
static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Prefix for ordinary method calls.
const CALL_PREFIX: &str = "req";

/// Prefix for handshake calls.
const HANDSHAKE_PREFIX: &str = "connect";

// ============================================================================
// RequestId
// ============================================================================

/// Correlation identifier tying a request frame to its response frame.
///
/// Locally generated IDs come from a monotonically increasing counter.
/// IDs decoded from the wire may be any string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Allocates the next ID for a method call (`req-<n>`).
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self::with_prefix(CALL_PREFIX)
    }

    /// Allocates the next ID for a handshake (`connect-<n>`).
    #[inline]
    #[must_use]
    pub fn handshake() -> Self {
        Self::with_prefix(HANDSHAKE_PREFIX)
    }

    /// Wraps an existing ID string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn with_prefix(prefix: &str) -> Self {
        let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        Self(format!("{prefix}-{n}"))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifies one transport session in logs.
///
/// Every reconnection attempt gets a fresh ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a random connection ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ============================================================================
// Tests
// ============================================================================
