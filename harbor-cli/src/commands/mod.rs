//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod operation;
mod project;
mod rolebinding;

pub use operation::OperationCommands;
pub use project::ProjectCommands;
pub use rolebinding::RoleBindingCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use crate::api::Reply;
use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Role binding management
    #[command(name = "rolebinding")]
    RoleBinding {
        #[command(subcommand)]
        command: RoleBindingCommands,
    },
    /// Tracked operation lookup
    Operation {
        #[command(subcommand)]
        command: OperationCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Project { command } => project::handle_project_command(command, config).await,
        Commands::RoleBinding { command } => {
            rolebinding::handle_rolebinding_command(command, config).await
        }
        Commands::Operation { command } => {
            operation::handle_operation_command(command, config).await
        }
    }
}

/// Print a gateway answer
///
/// Pending operations print their handle, resolved ones their status and
/// body. Failed outcomes make the command exit non-zero.
pub(crate) fn print_reply(reply: &Reply) -> Result<()> {
    if reply.is_pending() {
        let id = reply.operation_id().unwrap_or("?");
        println!(
            "{} Operation {} is still running",
            "…".yellow(),
            id.bold()
        );
        println!(
            "  Check on it with: {}",
            format!("harbor operation get {} --wait", id).cyan()
        );
        return Ok(());
    }

    let body = serde_json::to_string_pretty(&reply.body)?;

    if reply.status.is_success() {
        println!("{} {}", "✓".green(), reply.status.to_string().green());
        println!("{}", body);
        Ok(())
    } else {
        eprintln!("{} {}", "✗".red(), reply.status.to_string().red().bold());
        eprintln!("{}", body.red());
        anyhow::bail!("Request failed with status {}", reply.status.as_u16())
    }
}
