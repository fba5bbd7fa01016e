//! Frame envelope types.
//!
//! Every WebSocket message is exactly one [`Frame`], discriminated by its
//! `kind` field.
//!
//! # Format
//!
//! ```json
//! { "kind": "request",  "id": "req-1", "method": "agent.run", "params": { ... } }
//! { "kind": "response", "id": "req-1", "success": true, "payload": { ... } }
//! { "kind": "response", "id": "req-1", "success": false, "error": "quota exceeded" }
//! { "kind": "event",    "name": "agent.status", "payload": { ... }, "seq": 17 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, RemoteError, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Frame
// ============================================================================

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    /// Method invocation, local end to gateway.
    Request {
        /// Correlation ID.
        id: RequestId,
        /// Method name in `module.method` form.
        method: String,
        /// Method parameters. Always a JSON object.
        params: Map<String, Value>,
    },

    /// Answer to a request.
    Response {
        /// ID of the request being answered.
        id: RequestId,
        /// Whether the method succeeded.
        success: bool,
        /// Result data (if success).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        /// Error value (if failure).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },

    /// Unsolicited notification from the gateway.
    Event {
        /// Event name.
        name: String,
        /// Event data.
        #[serde(default)]
        payload: Value,
        /// Gateway sequence number, if the gateway numbers its events.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
}

impl Frame {
    /// Builds a request frame.
    #[inline]
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    /// Builds a successful response frame.
    #[inline]
    #[must_use]
    pub fn success(id: RequestId, payload: Value) -> Self {
        Self::Response {
            id,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Builds a failed response frame.
    #[inline]
    #[must_use]
    pub fn failure(id: RequestId, error: Value) -> Self {
        Self::Response {
            id,
            success: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Builds an event frame.
    #[inline]
    #[must_use]
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            name: name.into(),
            payload,
            seq: None,
        }
    }

    /// Returns the wire `kind` tag.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
            Self::Event { .. } => "event",
        }
    }

    /// Returns the correlation ID for requests and responses.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } => Some(id),
            Self::Event { .. } => None,
        }
    }
}

// ============================================================================
// Params
// ============================================================================

/// Serializes method parameters into the JSON object a request carries.
///
/// `null` (including `()`) becomes an empty object.
///
/// # Errors
///
/// - [`Error::Json`] if serialization fails
/// - [`Error::InvalidArgument`] if the value is not an object
pub fn params_object<P: Serialize + ?Sized>(params: &P) -> Result<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::invalid_argument(format!(
            "params must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Converts the payload or error of a response into a call outcome.
pub(crate) fn response_outcome(
    method: &str,
    success: bool,
    payload: Option<Value>,
    error: Option<Value>,
) -> Result<Value> {
    if success {
        Ok(payload.unwrap_or(Value::Null))
    } else {
        Err(Error::remote(
            method,
            RemoteError::new(error.unwrap_or(Value::Null)),
        ))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = params_object(&json!({"agentId": "a1"})).expect("object");
        let frame = Frame::request(RequestId::new("req-1"), "agent.run", params);
        let value = serde_json::to_value(&frame).expect("serialize");

        assert_eq!(
            value,
            json!({
                "kind": "request",
                "id": "req-1",
                "method": "agent.run",
                "params": {"agentId": "a1"}
            })
        );
    }

    #[test]
    fn test_success_response_omits_error() {
        let frame = Frame::success(RequestId::new("req-2"), json!({"ok": 1}));
        let value = serde_json::to_value(&frame).expect("serialize");

        assert_eq!(value["success"], json!(true));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_event_with_seq() {
        let frame: Frame = serde_json::from_value(json!({
            "kind": "event",
            "name": "agent.status",
            "payload": {"status": "busy"},
            "seq": 12
        }))
        .expect("parse");

        assert_eq!(
            frame,
            Frame::Event {
                name: "agent.status".into(),
                payload: json!({"status": "busy"}),
                seq: Some(12),
            }
        );
        assert_eq!(frame.kind(), "event");
        assert!(frame.id().is_none());
    }

    #[test]
    fn test_params_null_becomes_empty_object() {
        assert!(params_object(&()).expect("unit").is_empty());
        assert!(params_object(&Value::Null).expect("null").is_empty());
    }

    #[test]
    fn test_params_rejects_non_object() {
        let err = params_object(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_response_outcome() {
        assert_eq!(
            response_outcome("m", true, None, None).expect("success"),
            Value::Null
        );

        let err = response_outcome("m", false, None, Some(json!("denied"))).unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "m failed: denied");
    }
}
