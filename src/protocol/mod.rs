//! Gateway protocol message types.
//!
//! This module defines the frame format exchanged with the gateway and the
//! codec that turns frames into WebSocket messages.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `request` | Local → Gateway | Method call |
//! | `response` | Gateway → Local | Method result, matched by `id` |
//! | `event` | Gateway → Local | Unsolicited notification |
//!
//! Every connection starts with a `connect` request (see [`handshake`]).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | The [`Frame`] sum type |
//! | `codec` | JSON encode / strict decode |
//! | `handshake` | `connect` parameters and result |
//! | `agent` | `agent.run` parameters and result |

// ============================================================================
// Submodules
// ============================================================================

/// `agent.run` types.
pub mod agent;

/// Frame encoding and decoding.
pub mod codec;

/// Frame envelope.
pub mod frame;

/// Handshake types.
pub mod handshake;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::{AGENT_RUN_METHOD, AgentRunOutput, AgentRunParams};
pub use codec::{DecodeError, decode, encode};
pub use frame::{Frame, params_object};
pub use handshake::{
    AuthParams, CONNECT_METHOD, ClientInfo, ClientMode, ConnectParams, HelloOk, PROTOCOL_VERSION,
};
