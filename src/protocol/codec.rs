//! Frame codec.
//!
//! Turns [`Frame`]s into WebSocket text and back. Decoding never panics:
//! anything that is not one of the three known frame shapes becomes a
//! [`DecodeError`] the event loop can log and drop.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::error::Result;

use super::Frame;

// ============================================================================
// Constants
// ============================================================================

/// Frame kinds this codec understands.
const KNOWN_KINDS: [&str; 3] = ["request", "response", "event"];

// ============================================================================
// DecodeError
// ============================================================================

/// Why an inbound message was not a valid frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Valid JSON, but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Object without a string `kind` field.
    #[error("frame has no kind")]
    MissingKind,

    /// `kind` is not `request`, `response` or `event`.
    #[error("unknown frame kind: {0}")]
    UnknownKind(String),

    /// Known `kind`, but required fields are missing or mistyped.
    #[error("invalid {kind} frame: {message}")]
    InvalidShape {
        /// Frame kind.
        kind: String,
        /// Deserializer message.
        message: String,
    },
}

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encodes a frame as JSON text.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn encode(frame: &Frame) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Decodes one inbound message.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first problem found.
pub fn decode(bytes: &[u8]) -> std::result::Result<Frame, DecodeError> {
    match serde_json::from_slice::<Frame>(bytes) {
        Ok(frame) => Ok(frame),
        Err(err) => Err(classify(bytes, &err)),
    }
}

/// Works out why a message failed to decode. Failure path only.
fn classify(bytes: &[u8], err: &serde_json::Error) -> DecodeError {
    let value = match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => value,
        Err(parse_err) => return DecodeError::Malformed(parse_err.to_string()),
    };

    let Some(object) = value.as_object() else {
        return DecodeError::NotAnObject;
    };

    match object.get("kind").and_then(Value::as_str) {
        None => DecodeError::MissingKind,
        Some(kind) if !KNOWN_KINDS.contains(&kind) => DecodeError::UnknownKind(kind.to_string()),
        Some(kind) => DecodeError::InvalidShape {
            kind: kind.to_string(),
            message: err.to_string(),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
