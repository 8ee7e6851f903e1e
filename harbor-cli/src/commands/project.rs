//! Project command handlers
//!
//! Handles project creation, deletion and membership listing.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use harbor_core::dto::operation::SubmitMode;
use harbor_core::dto::project::CreateProject;
use serde_json::Value;

use super::print_reply;
use crate::api::GatewayClient;
use crate::config::Config;

/// Project subcommands
#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project and bind its owner
    Create {
        /// Project name
        project: String,

        /// Owner of the project
        #[arg(short, long)]
        username: String,

        /// Role granted to the owner
        #[arg(short, long, default_value = "edit")]
        role: String,

        /// Return the operation handle without waiting
        #[arg(long = "async")]
        no_wait: bool,
    },
    /// Delete a project
    Delete {
        /// Project name
        project: String,

        /// Return the operation handle without waiting
        #[arg(long = "async")]
        no_wait: bool,
    },
    /// List the projects a user is a member of
    List {
        /// Member to look up
        #[arg(short, long)]
        username: String,
    },
}

/// Handle project commands
pub async fn handle_project_command(command: ProjectCommands, config: &Config) -> Result<()> {
    let client = GatewayClient::new(&config.gateway_url);

    match command {
        ProjectCommands::Create {
            project,
            username,
            role,
            no_wait,
        } => {
            let req = CreateProject {
                project,
                username,
                role,
            };
            print_reply(&client.create_project(&req, submit_mode(no_wait)).await?)
        }
        ProjectCommands::Delete { project, no_wait } => {
            print_reply(&client.delete_project(&project, submit_mode(no_wait)).await?)
        }
        ProjectCommands::List { username } => list_projects(&client, &username).await,
    }
}

pub(crate) fn submit_mode(no_wait: bool) -> SubmitMode {
    if no_wait {
        SubmitMode::Async
    } else {
        SubmitMode::Sync
    }
}

/// List a user's projects
async fn list_projects(client: &GatewayClient, username: &str) -> Result<()> {
    let reply = client.list_projects(username).await?;
    if !reply.status.is_success() {
        return print_reply(&reply);
    }

    let projects: Vec<&str> = reply
        .body
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if projects.is_empty() {
        println!("{}", format!("No projects found for {}.", username).yellow());
    } else {
        println!(
            "{}",
            format!("Found {} project(s) for {}:", projects.len(), username).bold()
        );
        for project in projects {
            println!("  {} {}", "▸".cyan(), project);
        }
    }

    Ok(())
}
