//! Gateway RPC - Async request/response client for an agent gateway.
//!
//! This library talks to a remote gateway over a single WebSocket,
//! multiplexing concurrent method calls and receiving pushed events.
//!
//! # Architecture
//!
//! The client follows a request/response model with an event side channel:
//!
//! - **Local End (Rust)**: Sends `request` frames, awaits `response` frames by ID
//! - **Remote End (Gateway)**: Answers requests, pushes `event` frames
//!
//! Key design principles:
//!
//! - Each [`Connection`](transport::Connection) owns: socket + event loop + pending-call table
//! - Every connection opens with a `connect` handshake negotiating the protocol version
//! - Every call has a timeout; closing rejects every pending call at once
//! - Reconnects are bounded exponential backoff with jitter
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use gateway_rpc::{GatewayConfig, Result, invoke};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GatewayConfig::builder()
//!         .url("ws://127.0.0.1:18789")
//!         .token("secret")
//!         .build()?;
//!
//!     let agents = invoke(&config, "agents.list", &json!({}), Duration::from_secs(10)).await?;
//!     println!("{agents}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`GatewayConfig`], [`GatewaySession`], one-shot [`invoke`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame types and codec |
//! | [`transport`] | WebSocket connection, pending calls, events |
//!
//! # Features
//!
//! - `tls`: `wss://` support through rustls

// ============================================================================
// Modules
// ============================================================================

/// Client entry points: configuration, sessions, one-shot calls.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Gateway protocol frames.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{GatewayConfig, GatewayConfigBuilder, GatewaySession, invoke, run_agent};

// Error types
pub use error::{Error, RemoteError, Result};

// Identifier types
pub use identifiers::{ConnectionId, RequestId};

// Protocol types
pub use protocol::{AgentRunOutput, AgentRunParams, ClientInfo, ClientMode, Frame};

// Transport types
pub use transport::{ConnectionState, EventHandler, GatewayEvent, PendingCallInfo, ReconnectPolicy};
