use std::sync::Arc;

use anyhow::Context;
use harbor_broker::{BrokerClient, TokenProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod scheduler;
pub mod service;
#[cfg(test)]
mod testing;

use api::{AppState, github::GithubProxy};
use config::Config;
use scheduler::{OperationPoller, spawn_sweeper};
use service::table::OperationTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harbor_gateway=debug,harbor_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Harbor Gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Broker: {}, cluster: {}",
        config.broker_url,
        config.cluster_name
    );

    let mut broker = BrokerClient::new(config.broker_url.clone());
    if let Some(credentials) = config.credentials.clone() {
        tracing::info!("Authenticating broker calls via {}", credentials.token_url);
        broker = broker.with_token_provider(Arc::new(TokenProvider::new(credentials)));
    }

    // Single operation table shared by the HTTP layer, pollers and sweeper
    let table = Arc::new(OperationTable::new());
    let poller = OperationPoller::new(Arc::new(broker), table.clone(), config.poll_config());

    spawn_sweeper(table, config.retention(), config.sweep_interval);

    let github = config
        .github_url
        .clone()
        .map(|url| GithubProxy::new(url, config.github_token.clone()));
    if github.is_some() {
        tracing::info!("GitHub pass-through enabled");
    }

    let app = api::create_router(AppState {
        poller,
        cluster: config.cluster_name.clone(),
        sync_wait: config.sync_wait,
        github,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
