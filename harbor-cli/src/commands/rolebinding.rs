//! Role binding command handlers

use anyhow::Result;
use clap::Subcommand;
use harbor_core::dto::project::AddRoleBinding;

use super::print_reply;
use super::project::submit_mode;
use crate::api::GatewayClient;
use crate::config::Config;

/// Role binding subcommands
#[derive(Subcommand)]
pub enum RoleBindingCommands {
    /// List a project's role bindings
    List {
        /// Project name
        project: String,

        /// Return the operation handle without waiting
        #[arg(long = "async")]
        no_wait: bool,
    },
    /// Bind a user to a role
    Add {
        /// Project name
        project: String,

        /// User to bind
        #[arg(short, long)]
        username: String,

        /// Role to grant
        #[arg(short, long)]
        role: String,

        /// Return the operation handle without waiting
        #[arg(long = "async")]
        no_wait: bool,
    },
    /// Remove a user's role binding
    Remove {
        /// Project name
        project: String,

        /// User to unbind
        #[arg(short, long)]
        username: String,

        /// Role to revoke
        #[arg(short, long)]
        role: String,

        /// Return the operation handle without waiting
        #[arg(long = "async")]
        no_wait: bool,
    },
}

/// Handle role binding commands
pub async fn handle_rolebinding_command(
    command: RoleBindingCommands,
    config: &Config,
) -> Result<()> {
    let client = GatewayClient::new(&config.gateway_url);

    let reply = match command {
        RoleBindingCommands::List { project, no_wait } => {
            client
                .list_role_bindings(&project, submit_mode(no_wait))
                .await?
        }
        RoleBindingCommands::Add {
            project,
            username,
            role,
            no_wait,
        } => {
            let req = AddRoleBinding { username, role };
            client
                .add_role_binding(&project, &req, submit_mode(no_wait))
                .await?
        }
        RoleBindingCommands::Remove {
            project,
            username,
            role,
            no_wait,
        } => {
            client
                .remove_role_binding(&project, &username, &role, submit_mode(no_wait))
                .await?
        }
    };

    print_reply(&reply)
}
