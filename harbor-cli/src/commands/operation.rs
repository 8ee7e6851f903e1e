//! Operation command handlers
//!
//! Looks up operations tracked by the gateway, optionally waiting for them
//! to resolve.

use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use super::print_reply;
use crate::api::GatewayClient;
use crate::config::Config;

/// Operation subcommands
#[derive(Subcommand)]
pub enum OperationCommands {
    /// Get the status or outcome of an operation
    Get {
        /// Operation handle
        id: String,

        /// Keep polling until the operation resolves
        #[arg(short, long)]
        wait: bool,

        /// Seconds between two lookups when waiting
        #[arg(short, long, default_value_t = 2)]
        interval: u64,
    },
}

/// Handle operation commands
pub async fn handle_operation_command(command: OperationCommands, config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.gateway_url);

    match command {
        OperationCommands::Get { id, wait, interval } => {
            get_operation(&client, &id, wait, Duration::from_secs(interval.max(1))).await
        }
    }
}

async fn get_operation(
    client: &GatewayClient,
    id: &str,
    wait: bool,
    interval: Duration,
) -> Result<()> {
    let mut reply = client.get_operation(id).await?;

    while wait && reply.is_pending() {
        let state = reply
            .body
            .get("state")
            .and_then(|s| s.as_str())
            .unwrap_or("running");
        println!("{}", format!("Operation {} is {}...", id, state).dimmed());

        tokio::time::sleep(interval).await;
        reply = client.get_operation(id).await?;
    }

    print_reply(&reply)
}
