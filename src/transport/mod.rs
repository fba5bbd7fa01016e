//! WebSocket transport layer.
//!
//! This module handles communication between the local client and the
//! gateway over one WebSocket per connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Caller (Rust)  │                              │  Gateway        │
//! │                 │         WebSocket            │                 │
//! │  Connection     │◄────────────────────────────►│  request →      │
//! │  → PendingTable │      ws:// or wss://         │  ← response     │
//! │  → Dispatcher   │                              │  ← event        │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - Open the socket and run the `connect` handshake
//! 2. `Connection::call` - Send requests, receive responses/events
//! 3. `Connection::close` - Reject pending calls and close the socket
//!
//! Reconnecting is done one level up, by the session, with a fresh
//! `Connection` (and a fresh pending table) each time.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `pending` | Request ID → waiting caller |
//! | `dispatch` | Event handler registration and delivery |
//! | `state` | Connection state machine |
//! | `backoff` | Reconnect delays |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff policy.
pub mod backoff;

/// WebSocket connection and event loop.
pub mod connection;

/// Event dispatch.
pub mod dispatch;

/// Pending-call table.
mod pending;

/// Connection state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{Backoff, ReconnectPolicy};
pub use connection::Connection;
pub use dispatch::{EventDispatcher, EventHandler, GatewayEvent};
pub use pending::PendingCallInfo;
pub use state::ConnectionState;
