//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Gateway configuration from the environment

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use gateway_rpc::{ClientMode, GatewayConfig};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Gateway URL used when `GATEWAY_URL` is not set.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:18789";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub no_wait: bool,
    /// First argument that is not a flag.
    pub positional: Vec<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            positional: args.into_iter().filter(|a| !a.starts_with("--")).collect(),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "gateway_rpc=debug"
    } else {
        "gateway_rpc=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

/// Builds a config from `GATEWAY_URL` and `GATEWAY_TOKEN`.
pub fn config_from_env(mode: ClientMode) -> anyhow::Result<GatewayConfig> {
    let url = std::env::var("GATEWAY_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token = std::env::var("GATEWAY_TOKEN")
        .map_err(|_| anyhow::anyhow!("GATEWAY_TOKEN is not set"))?;

    Ok(GatewayConfig::builder()
        .url(url)
        .token(token)
        .client_id("gateway-rpc-demo")
        .mode(mode)
        .build()?)
}

/// Wait for Ctrl+C or skip if `--no-wait` flag is set.
pub async fn wait_for_exit(no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Skipping wait");
        return;
    }

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();
}
