//! Gateway client entry points.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GatewayConfig`] | Validated connection settings |
//! | [`GatewayConfigBuilder`] | Fluent configuration builder |
//! | [`GatewaySession`] | Long-lived, reconnecting session |
//! | [`invoke`] / [`run_agent`] | One connection, one call |
//!
//! Pick [`GatewaySession`] for dashboards and monitors that follow the
//! event stream; pick the one-shot functions for request handlers that need
//! a single result.

// ============================================================================
// Submodules
// ============================================================================

/// Configuration builder.
pub mod config;

/// One-shot invocations.
pub mod oneshot;

/// Persistent session with reconnect.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use oneshot::{invoke, run_agent};
pub use session::GatewaySession;
