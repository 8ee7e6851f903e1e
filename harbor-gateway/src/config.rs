//! Gateway configuration
//!
//! Defines all configurable parameters for the gateway including broker
//! connection settings, polling cadence and budgets, and result retention.

use std::time::Duration;

use harbor_broker::ClientCredentials;

use crate::scheduler::PollConfig;
use crate::service::table::RetentionPolicy;

/// Gateway configuration
///
/// All intervals and budgets are configurable to allow tuning for brokers
/// of different speeds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,

    /// Job broker base URL (e.g., "https://broker.example.com")
    pub broker_url: String,

    /// Cluster every project operation targets
    pub cluster_name: String,

    /// OAuth2 client credentials for the broker, if it requires a token
    pub credentials: Option<ClientCredentials>,

    /// Delay between two polls of the same operation
    pub poll_interval: Duration,

    /// Overall budget for an operation chain before it resolves as timed out
    pub poll_timeout: Duration,

    /// Extra polls granted when the broker finished without reporting the expected key
    pub missing_detail_grace_polls: u32,

    /// Consecutive failed polls tolerated before resolving as unavailable
    pub max_fetch_failures: u32,

    /// How long a submitting request waits before answering 202
    pub sync_wait: Duration,

    /// Maximum lifetime of a resolved operation
    pub result_retention: Duration,

    /// Lifetime of a resolved operation after its first lookup
    pub read_retention: Duration,

    /// How often expired operations are swept
    pub sweep_interval: Duration,

    /// Version-control hosting API base URL; pass-through disabled when unset
    pub github_url: Option<String>,

    /// Token sent to the version-control hosting API
    pub github_token: Option<String>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(broker_url: String, cluster_name: String) -> Self {
        Self {
            port: 3000,
            broker_url,
            cluster_name,
            credentials: None,
            poll_interval: Duration::from_millis(1000),
            poll_timeout: Duration::from_secs(600), // 10 minutes
            missing_detail_grace_polls: 1,
            max_fetch_failures: 30,
            sync_wait: Duration::from_secs(25),
            result_retention: Duration::from_secs(3600),
            read_retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            github_url: None,
            github_token: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - OPENSHIFT_URL (required)
    /// - CLUSTER_NAME (required)
    /// - PORT (optional, default: 3000)
    /// - IAMAAS_URL, CLIENT_ID, CLIENT_SECRET, SCOPE (optional, all but SCOPE required together)
    /// - POLL_INTERVAL_MS (optional, default: 1000)
    /// - POLL_TIMEOUT_SECS (optional, default: 600)
    /// - MISSING_DETAIL_GRACE_POLLS (optional, default: 1)
    /// - MAX_FETCH_FAILURES (optional, default: 30)
    /// - SYNC_WAIT_SECS (optional, default: 25)
    /// - RESULT_RETENTION_SECS (optional, default: 3600)
    /// - READ_RETENTION_SECS (optional, default: 300)
    /// - SWEEP_INTERVAL_SECS (optional, default: 60)
    /// - GITHUB_URL, GITHUB_TOKEN (optional)
    pub fn from_env() -> anyhow::Result<Self> {
        let broker_url = std::env::var("OPENSHIFT_URL")
            .map_err(|_| anyhow::anyhow!("OPENSHIFT_URL environment variable not set"))?;

        let cluster_name = std::env::var("CLUSTER_NAME")
            .map_err(|_| anyhow::anyhow!("CLUSTER_NAME environment variable not set"))?;

        let defaults = Self::new(broker_url, cluster_name);

        let credentials = match std::env::var("IAMAAS_URL").ok() {
            Some(token_url) => Some(ClientCredentials {
                token_url,
                client_id: std::env::var("CLIENT_ID")
                    .map_err(|_| anyhow::anyhow!("CLIENT_ID must be set with IAMAAS_URL"))?,
                client_secret: std::env::var("CLIENT_SECRET")
                    .map_err(|_| anyhow::anyhow!("CLIENT_SECRET must be set with IAMAAS_URL"))?,
                scope: std::env::var("SCOPE").ok(),
            }),
            None => None,
        };

        Ok(Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            credentials,
            poll_interval: env_parse("POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            poll_timeout: env_parse("POLL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_timeout),
            missing_detail_grace_polls: env_parse("MISSING_DETAIL_GRACE_POLLS")
                .unwrap_or(defaults.missing_detail_grace_polls),
            max_fetch_failures: env_parse("MAX_FETCH_FAILURES")
                .unwrap_or(defaults.max_fetch_failures),
            sync_wait: env_parse("SYNC_WAIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_wait),
            result_retention: env_parse("RESULT_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.result_retention),
            read_retention: env_parse("READ_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_retention),
            sweep_interval: env_parse("SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            github_url: std::env::var("GITHUB_URL").ok(),
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            ..defaults
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster_name.is_empty() {
            anyhow::bail!("cluster_name cannot be empty");
        }

        if !is_http_url(&self.broker_url) {
            anyhow::bail!("broker_url must start with http:// or https://");
        }

        if let Some(credentials) = &self.credentials {
            if !is_http_url(&credentials.token_url) {
                anyhow::bail!("IAMAAS_URL must start with http:// or https://");
            }
        }

        if let Some(github_url) = &self.github_url {
            if !is_http_url(github_url) {
                anyhow::bail!("github_url must start with http:// or https://");
            }
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.poll_timeout < self.poll_interval {
            anyhow::bail!("poll_timeout must be at least one poll_interval");
        }

        if self.max_fetch_failures == 0 {
            anyhow::bail!("max_fetch_failures must be greater than 0");
        }

        if self.sweep_interval.is_zero() {
            anyhow::bail!("sweep_interval must be greater than 0");
        }

        Ok(())
    }

    /// Polling parameters handed to the operation poller
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
            timeout: self.poll_timeout,
            missing_detail_grace_polls: self.missing_detail_grace_polls,
            max_fetch_failures: self.max_fetch_failures,
        }
    }

    /// Eviction policy handed to the sweeper
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            result_retention: self.result_retention,
            read_retention: self.read_retention,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
