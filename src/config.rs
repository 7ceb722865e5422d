use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{AssetType, Severity};

pub const DEFAULT_BASE_URL: &str = "https://nucleus-us1.nucleussec.com/nucleus/api";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_RATE_LIMIT_CALLS: u32 = 100;
pub const DEFAULT_RATE_LIMIT_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings fixed at client construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent as `x-apikey` on every request.
    pub api_key: String,
    pub base_url: String,
    /// How long a successful read stays cached. Zero disables caching.
    pub cache_ttl: Duration,
    /// Admission ceiling per `rate_limit_period`.
    pub rate_limit_calls: u32,
    pub rate_limit_period: Duration,
    pub request_timeout: Duration,
    /// Run a background sweep of expired cache entries at this interval.
    /// `None` leaves eviction to lookups.
    pub cache_sweep_interval: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            rate_limit_calls: DEFAULT_RATE_LIMIT_CALLS,
            rate_limit_period: DEFAULT_RATE_LIMIT_PERIOD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_sweep_interval: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn rate_limit(mut self, calls: u32, period: Duration) -> Self {
        self.rate_limit_calls = calls;
        self.rate_limit_period = period;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn cache_sweep_interval(mut self, every: Duration) -> Self {
        self.cache_sweep_interval = Some(every);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("api_key must not be empty".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.rate_limit_calls == 0 {
            return Err(Error::Config("rate_limit_calls must be at least 1".into()));
        }
        if self.rate_limit_period.is_zero() {
            return Err(Error::Config("rate_limit_period must be greater than zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be greater than zero".into()));
        }
        if matches!(self.cache_sweep_interval, Some(every) if every.is_zero()) {
            return Err(Error::Config("cache_sweep_interval must be greater than zero".into()));
        }
        Ok(())
    }
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "nucleus")]
#[command(about = "Command line client for the Nucleus vulnerability management API")]
pub struct Args {
    // API key
    #[arg(long, env = "NUCLEUS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    // API root, e.g. https://nucleus-us1.nucleussec.com/nucleus/api
    #[arg(long, env = "NUCLEUS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    // Cache TTL in seconds (0 disables the cache)
    #[arg(short, long, default_value_t = 300)]
    pub cache_ttl: u64,

    // Rate limit max calls per period
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_CALLS)]
    pub rate_limit_calls: u32,

    // Rate limit period in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_limit_period: u64,

    // Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    // Debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    // Print Prometheus metrics after the command
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_key.clone())
            .base_url(self.base_url.clone())
            .cache_ttl(Duration::from_secs(self.cache_ttl))
            .rate_limit(
                self.rate_limit_calls,
                Duration::from_secs(self.rate_limit_period),
            )
            .request_timeout(Duration::from_secs(self.timeout))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List projects
    Projects,
    /// Finding counts per severity for a project
    Metrics { project_id: u64 },
    /// List assets in a project
    Assets { project_id: u64 },
    /// Create an asset
    CreateAsset {
        project_id: u64,
        name: String,
        #[arg(long = "type", value_enum, default_value_t = AssetType::Host)]
        asset_type: AssetType,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        os_name: Option<String>,
        #[arg(long)]
        os_version: Option<String>,
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Update fields of an existing asset
    UpdateAsset {
        project_id: u64,
        asset_id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        ip: Option<String>,
    },
    /// Search findings by severity
    Findings {
        project_id: u64,
        #[arg(long, value_enum, default_value_t = Severity::Critical)]
        severity: Severity,
    },
    /// Fetch findings for several assets in parallel
    AssetFindings {
        project_id: u64,
        asset_ids: Vec<u64>,
        // Assets taken from the project when none are given
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Update finding statuses, one `NUMBER=STATUS[:COMMENT]` per item
    BulkUpdate {
        project_id: u64,
        #[arg(required = true)]
        updates: Vec<String>,
    },
    /// Project risk score
    RiskScore { project_id: u64 },
    /// Concurrent fetch, cache timing and bulk update walkthrough
    Demo {
        /// Project searched for critical findings
        #[arg(long, default_value_t = 123)]
        search_project: u64,
    },
}
