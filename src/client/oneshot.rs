//! One-shot invocations.
//!
//! Open a connection, make exactly one call, close the connection. Suited to
//! request handlers that need a single gateway result and no event stream.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use gateway_rpc::{AgentRunParams, ClientMode, GatewayConfig, run_agent};
//!
//! # async fn example() -> gateway_rpc::Result<()> {
//! let config = GatewayConfig::builder()
//!     .url("ws://127.0.0.1:18789")
//!     .token("secret")
//!     .mode(ClientMode::Api)
//!     .build()?;
//!
//! let params = AgentRunParams::new("agent-7", "Summarize today's tickets");
//! let output = run_agent(&config, &params, Duration::from_secs(60)).await?;
//! println!("{} ({} tokens)", output.content, output.token_usage);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{AGENT_RUN_METHOD, AgentRunOutput, AgentRunParams};
use crate::transport::{Connection, EventDispatcher};

use super::GatewayConfig;

// ============================================================================
// Functions
// ============================================================================

/// Calls `method` once on a fresh connection.
///
/// The connection is closed on every exit path: success, remote error,
/// timeout or transport failure. If the returned future is dropped, the
/// connection's last handle goes with it and its socket closes.
///
/// # Errors
///
/// Any error from [`Connection::open`] or [`Connection::call`].
pub async fn invoke<P>(
    config: &GatewayConfig,
    method: &str,
    params: &P,
    timeout: Duration,
) -> Result<Value>
where
    P: Serialize + ?Sized,
{
    let connection = Connection::open(config, Arc::new(EventDispatcher::new())).await?;
    debug!(connection = %connection.id(), method, "One-shot connection ready");

    let result = connection.call(method, params, timeout).await;
    connection.close().await;

    match &result {
        Ok(_) => debug!(method, "One-shot call completed"),
        Err(e) => warn!(method, error = %e, "One-shot call failed"),
    }
    result
}

/// Runs an agent once and interprets its reply.
///
/// # Errors
///
/// Same as [`invoke`].
pub async fn run_agent(
    config: &GatewayConfig,
    params: &AgentRunParams,
    timeout: Duration,
) -> Result<AgentRunOutput> {
    info!(agent = %params.agent_id, "Running agent");

    let payload = invoke(config, AGENT_RUN_METHOD, params, timeout).await?;
    let output = AgentRunOutput::from_payload(&payload);

    info!(
        agent = %params.agent_id,
        tokens = output.token_usage,
        cost = output.cost,
        "Agent run completed"
    );
    Ok(output)
}

// ============================================================================
// Tests
// ============================================================================
