use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_CS_URL: &str = "DCI_CS_URL";
pub const ENV_CLIENT_ID: &str = "DCI_CLIENT_ID";
pub const ENV_API_SECRET: &str = "DCI_API_SECRET";
pub const ENV_WORKING_DIR: &str = "DCI_ANALYSIS_WORKING_DIR";
pub const ENV_CONCURRENCY: &str = "DCI_ANALYSIS_CONCURRENCY";

/// Topics skipped when syncing every topic of a product
pub const DEFAULT_EXCLUDED_TOPICS: [&str; 5] = [
    "RHEL-7-nightly",
    "RHEL-7-milestone",
    "RHEL-8-nightly",
    "RHEL-8-milestone",
    "RHEL-9.0",
];

/// Top-level configuration, passed explicitly to every component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Root directory holding one sub-directory per topic
    pub working_dir: PathBuf,
    pub http: HttpConfig,
    pub sync: SyncConfig,
}

/// Retry and timeout settings of the CI client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Attempts per request before giving up
    pub retry_attempts: u32,
    /// Per-attempt timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of jobs fetched and converted at once
    pub concurrency: usize,
    /// Jobs decoding to fewer tests are not persisted
    pub min_tests: usize,
    /// Topics skipped by product-wide syncs
    pub excluded_topics: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            http: HttpConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            request_timeout_ms: 5_000,
            retry_delay_ms: 500,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            min_tests: crate::MIN_TESTS_PER_JOB,
            excluded_topics: DEFAULT_EXCLUDED_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl AnalysisConfig {
    /// Load defaults, then the optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(ENV_WORKING_DIR) {
            self.working_dir = PathBuf::from(dir);
        }
        if let Ok(concurrency) = std::env::var(ENV_CONCURRENCY) {
            self.sync.concurrency = concurrency.parse().unwrap_or(self.sync.concurrency);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.retry_attempts == 0 {
            return Err(AnalysisError::Config("http.retry_attempts must be at least 1".into()));
        }
        if self.sync.concurrency == 0 {
            return Err(AnalysisError::Config("sync.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn is_excluded_topic(&self, topic: &str) -> bool {
        self.sync.excluded_topics.iter().any(|t| t == topic)
    }
}

/// Control-plane URL and API key pair used to sign requests
#[derive(Clone)]
pub struct Credentials {
    pub cs_url: String,
    pub client_id: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cs_url", &self.cs_url)
            .field("client_id", &self.client_id)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        cs_url: impl Into<String>,
        client_id: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cs_url: cs_url.into(),
            client_id: client_id.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `DCI_CS_URL`, `DCI_CLIENT_ID` and `DCI_API_SECRET`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |key: &str| match lookup(key).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };
        let cs_url = read(ENV_CS_URL);
        let client_id = read(ENV_CLIENT_ID);
        let api_secret = read(ENV_API_SECRET);

        if !missing.is_empty() {
            return Err(AnalysisError::MissingCredentials(missing));
        }
        Ok(Self::new(cs_url, client_id, api_secret))
    }

    /// Base URL of the versioned REST API
    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.cs_url.trim_end_matches('/'))
    }
}
