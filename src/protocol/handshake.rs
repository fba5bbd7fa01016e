//! Handshake message types.
//!
//! The first request on every connection is `connect`. The gateway answers
//! with the protocol version it picked, or rejects the connection.
//!
//! # Format
//!
//! ```json
//! {
//!   "minProtocol": 3,
//!   "maxProtocol": 3,
//!   "client": { "id": "gateway-client", "version": "0.1.0", "platform": "linux", "mode": "ui" },
//!   "auth": { "token": "..." }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Handshake method name.
pub const CONNECT_METHOD: &str = "connect";

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 3;

// ============================================================================
// ClientMode
// ============================================================================

/// How the client uses the gateway. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// Interactive, long-lived session.
    #[default]
    Ui,
    /// Backend caller making one-shot invocations.
    Api,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ui => f.write_str("ui"),
            Self::Api => f.write_str("api"),
        }
    }
}

// ============================================================================
// ClientInfo
// ============================================================================

/// Client descriptor sent in the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identity.
    pub id: String,
    /// Client version.
    pub version: String,
    /// Operating system or runtime platform.
    pub platform: String,
    /// Usage mode.
    pub mode: ClientMode,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            id: "gateway-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            mode: ClientMode::default(),
        }
    }
}

// ============================================================================
// ConnectParams
// ============================================================================

/// Bearer credential.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthParams {
    /// Gateway token.
    pub token: String,
}

impl fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthParams")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Parameters of the `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest supported protocol version (inclusive).
    pub min_protocol: u32,
    /// Highest supported protocol version (inclusive).
    pub max_protocol: u32,
    /// Client descriptor.
    pub client: ClientInfo,
    /// Credential.
    pub auth: AuthParams,
}

// ============================================================================
// HelloOk
// ============================================================================

/// Successful handshake payload.
///
/// Only the negotiated version is interpreted; everything else the gateway
/// sends is kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HelloOk {
    /// Protocol version picked by the gateway.
    #[serde(default)]
    pub protocol: Option<u32>,

    /// Server descriptor, if any.
    #[serde(default)]
    pub server: Option<Value>,
}

impl HelloOk {
    /// Parses a handshake payload. Non-object payloads carry no data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeMalformed`] if the payload is an object with
    /// mistyped fields.
    pub fn from_payload(payload: Value) -> Result<Self> {
        if payload.is_object() {
            serde_json::from_value(payload).map_err(|e| Error::handshake_malformed(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Resolves the negotiated version against the offered range.
    ///
    /// A missing version means the gateway accepted the highest offer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolMismatch`] if the gateway picked a version
    /// outside `min..=max`.
    pub fn negotiate(&self, min: u32, max: u32) -> Result<u32> {
        let selected = self.protocol.unwrap_or(max);
        if (min..=max).contains(&selected) {
            Ok(selected)
        } else {
            Err(Error::ProtocolMismatch { min, max, selected })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn params() -> ConnectParams {
        ConnectParams {
            min_protocol: 3,
            max_protocol: 3,
            client: ClientInfo {
                id: "clawdirector".into(),
                version: "1.0.0".into(),
                platform: "web".into(),
                mode: ClientMode::Api,
            },
            auth: AuthParams {
                token: "secret".into(),
            },
        }
    }

    #[test]
    fn test_connect_params_wire_shape() {
        let value = serde_json::to_value(params()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "minProtocol": 3,
                "maxProtocol": 3,
                "client": {"id": "clawdirector", "version": "1.0.0", "platform": "web", "mode": "api"},
                "auth": {"token": "secret"}
            })
        );
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let debug = format!("{:?}", params());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_default_client_info() {
        let info = ClientInfo::default();
        assert_eq!(info.id, "gateway-client");
        assert_eq!(info.mode, ClientMode::Ui);
        assert_eq!(info.platform, std::env::consts::OS);
    }

    #[test]
    fn test_hello_ok_negotiation() {
        let hello = HelloOk::from_payload(json!({"type": "hello-ok", "protocol": 3}))
            .expect("parse");
        assert_eq!(hello.negotiate(3, 3).expect("in range"), 3);
    }

    #[test]
    fn test_hello_ok_missing_version_uses_max() {
        let hello = HelloOk::from_payload(Value::Null).expect("parse");
        assert_eq!(hello.negotiate(2, 4).expect("in range"), 4);
    }

    #[test]
    fn test_hello_ok_out_of_range() {
        let hello = HelloOk::from_payload(json!({"protocol": 2})).expect("parse");
        let err = hello.negotiate(3, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolMismatch {
                selected: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_hello_ok_mistyped_version() {
        let err = HelloOk::from_payload(json!({"protocol": "three"})).unwrap_err();
        assert!(matches!(err, Error::HandshakeMalformed { .. }));
        assert!(err.is_handshake_error());
    }
}
