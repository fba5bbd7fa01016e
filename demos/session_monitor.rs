//! Persistent session with live events.
//!
//! Demonstrates:
//! - Connecting a session and following its status
//! - Printing every gateway event
//! - Sending a request over the live connection
//! - Automatic reconnect when the gateway restarts
//!
//! Usage:
//!   GATEWAY_TOKEN=... cargo run --example session_monitor
//!   GATEWAY_TOKEN=... cargo run --example session_monitor -- --no-wait
//!   GATEWAY_TOKEN=... cargo run --example session_monitor -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::Args;
use gateway_rpc::{ClientMode, ConnectionState, GatewayEvent, GatewaySession};
use serde_json::json;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Session Monitor ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting...");
    let session = GatewaySession::new(common::config_from_env(ClientMode::Ui)?);

    session.set_event_handler(Arc::new(|event: &GatewayEvent| {
        let seq = event.seq.map(|s| format!("#{s} ")).unwrap_or_default();
        println!("    [event] {seq}{}: {}", event.name, event.payload);
    }));

    let mut status_rx = session.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            println!("    [status] {status}");
        }
    });

    session.connect();
    session
        .wait_for_status(ConnectionState::Connected, Duration::from_secs(15))
        .await?;

    println!(
        "    ✓ Connected (protocol {})\n",
        session.protocol_version().unwrap_or_default()
    );

    // ========================================================================
    // Request
    // ========================================================================

    println!("[2] Listing sessions...");
    match session.send_request("sessions.list", &json!({})).await {
        Ok(payload) => println!("    ✓ {payload}\n"),
        Err(e) => println!("    ✗ {e}\n"),
    }

    // ========================================================================
    // Follow events
    // ========================================================================

    println!("[3] Following events...");
    common::wait_for_exit(args.no_wait).await;

    session.disconnect().await;
    if let Some(e) = session.last_error() {
        println!("    Last error: {e}");
    }
    println!("    ✓ Disconnected");

    Ok(())
}
