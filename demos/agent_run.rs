//! One-shot agent run.
//!
//! Demonstrates:
//! - Building a config from the environment
//! - Running `agent.run` on a fresh connection
//! - Reading content, token usage and cost
//!
//! Usage:
//!   GATEWAY_TOKEN=... cargo run --example agent_run -- <agent-id> "<message>"
//!   GATEWAY_TOKEN=... cargo run --example agent_run -- <agent-id> "<message>" --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use common::Args;
use gateway_rpc::{AgentRunParams, ClientMode, run_agent};

// ============================================================================
// Constants
// ============================================================================

const RUN_TIMEOUT: Duration = Duration::from_secs(60);

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
    println!("=== Agent Run ===\n");

    let agent_id = args.positional.first().context("missing <agent-id>")?;
    let message = args.positional.get(1).context("missing <message>")?;

    // ========================================================================
    // Configure
    // ========================================================================

    println!("[1] Loading configuration...");
    let config = common::config_from_env(ClientMode::Api)?;
    println!("    Gateway: {}", config.url());
    println!("    ✓ Config ready\n");

    // ========================================================================
    // Run
    // ========================================================================

    println!("[2] Running agent {agent_id}...");
    let mut params = AgentRunParams::new(agent_id, message);
    if let Ok(model) = std::env::var("AGENT_MODEL") {
        params = params.model(model);
    }

    let output = run_agent(&config, &params, RUN_TIMEOUT).await?;

    println!("    ✓ Done\n");
    println!("{}\n", output.content);
    println!("    Tokens: {}", output.token_usage);
    println!("    Cost:   ${:.4}", output.cost);

    Ok(())
}
