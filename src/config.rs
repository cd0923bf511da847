//! Configuration management for athena-relay.
//!
//! Settings come from a TOML file, with endpoint and credential defaults
//! taken from the environment. Everything is validated before the first
//! remote call.

use crate::backoff::{ExponentialDelay, LinearDelay, RetryPolicy};
use crate::engine::{EncryptionConfiguration, HttpQueryEngine, HttpQueryEngineConfig};
use crate::error::{RelayError, Result};
use crate::store::HttpObjectStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page the engine hands out in one `GetQueryResults` call.
pub const MAX_PAGE_SIZE: u32 = 1000;

const ENV_ENGINE_ENDPOINT: &str = "ATHENA_RELAY_ENGINE_ENDPOINT";
const ENV_STORE_ENDPOINT: &str = "ATHENA_RELAY_STORE_ENDPOINT";
const ENV_AUTHORIZATION: &str = "ATHENA_RELAY_AUTHORIZATION";

/// Main configuration structure for athena-relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Database used when a query does not name one.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_workgroup")]
    pub workgroup: String,

    pub catalog: Option<String>,

    /// `s3://` prefix the engine writes results under. When unset the
    /// workgroup's own setting applies.
    pub output_location: Option<String>,

    pub encryption: Option<EncryptionSettings>,

    /// Decode results into records. When off, artifact lines are returned as-is.
    #[serde(default = "default_true")]
    pub format_json: bool,

    /// Omit empty CSV cells from records instead of emitting null.
    #[serde(default = "default_true")]
    pub ignore_empty: bool,

    /// Attach scan size, cost and timing statistics to the result.
    #[serde(default)]
    pub get_stats: bool,

    /// Stop after the execution succeeds, without reading results.
    #[serde(default)]
    pub skip_results: bool,

    /// When false, return the execution id right after submission.
    #[serde(default = "default_true")]
    pub wait_for_results: bool,

    /// Fetch DML results through the engine's paginated API, this many rows
    /// per page.
    pub page_size: Option<u32>,

    /// Base delay between status polls, in milliseconds.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Grow the poll delay by this factor on every re-poll.
    pub poll_growth_factor: Option<f64>,

    /// Grow the poll delay by this many milliseconds on every re-poll.
    pub poll_step_ms: Option<u64>,

    /// Ceiling for a growing poll delay, in milliseconds.
    #[serde(default = "default_max_poll_delay_ms")]
    pub max_poll_delay_ms: u64,

    /// Delay before retrying a transient engine error, in milliseconds.
    #[serde(default = "default_transient_retry_ms")]
    pub transient_retry_ms: u64,

    pub max_transient_retries: Option<u32>,

    /// Give up after this many non-terminal status polls.
    pub max_polls: Option<u32>,

    /// Normalize date and timestamp columns to UTC instants.
    #[serde(default)]
    pub utc_dates: bool,

    #[serde(default)]
    pub engine: EndpointConfig,

    #[serde(default)]
    pub store: EndpointConfig,
}

/// Encryption applied to result artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    /// `SSE_S3`, `SSE_KMS` or `CSE_KMS`.
    pub option: String,
    pub kms_key: Option<String>,
}

impl From<&EncryptionSettings> for EncryptionConfiguration {
    fn from(settings: &EncryptionSettings) -> Self {
        Self {
            encryption_option: settings.option.clone(),
            kms_key: settings.kms_key.clone(),
        }
    }
}

/// Where a remote service lives and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub endpoint: Option<String>,

    /// Sent verbatim as the `Authorization` header.
    pub authorization: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "default".to_string()
}

fn default_workgroup() -> String {
    "primary".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retry_ms() -> u64 {
    crate::backoff::DEFAULT_POLL_INTERVAL_MS
}

fn default_max_poll_delay_ms() -> u64 {
    crate::backoff::DEFAULT_MAX_POLL_DELAY_MS
}

fn default_transient_retry_ms() -> u64 {
    crate::backoff::DEFAULT_TRANSIENT_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            authorization: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            workgroup: default_workgroup(),
            catalog: None,
            output_location: None,
            encryption: None,
            format_json: true,
            ignore_empty: true,
            get_stats: false,
            skip_results: false,
            wait_for_results: true,
            page_size: None,
            retry_ms: default_retry_ms(),
            poll_growth_factor: None,
            poll_step_ms: None,
            max_poll_delay_ms: default_max_poll_delay_ms(),
            transient_retry_ms: default_transient_retry_ms(),
            max_transient_retries: None,
            max_polls: None,
            utc_dates: false,
            engine: EndpointConfig::default(),
            store: EndpointConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("athena-relay")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::configuration(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RelayError::configuration(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills unset endpoints and credentials from the environment.
    pub fn apply_env_defaults(&mut self) {
        if self.engine.endpoint.is_none() {
            self.engine.endpoint = std::env::var(ENV_ENGINE_ENDPOINT).ok();
        }
        if self.store.endpoint.is_none() {
            self.store.endpoint = std::env::var(ENV_STORE_ENDPOINT).ok();
        }
        if let Ok(authorization) = std::env::var(ENV_AUTHORIZATION) {
            if self.engine.authorization.is_none() {
                self.engine.authorization = Some(authorization.clone());
            }
            if self.store.authorization.is_none() {
                self.store.authorization = Some(authorization);
            }
        }
    }

    /// Checks every setting that can be checked without a remote call.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(RelayError::configuration("database must not be empty"));
        }
        if self.workgroup.trim().is_empty() {
            return Err(RelayError::configuration("workgroup must not be empty"));
        }
        if let Some(location) = &self.output_location {
            validate_output_location(location)?;
        }
        if let Some(encryption) = &self.encryption {
            if encryption.option.trim().is_empty() {
                return Err(RelayError::configuration(
                    "encryption option must not be empty",
                ));
            }
        }
        if let Some(page_size) = self.page_size {
            validate_page_size(page_size)?;
        }
        if self.retry_ms == 0 {
            return Err(RelayError::configuration("retry_ms must be greater than 0"));
        }
        if self.transient_retry_ms == 0 {
            return Err(RelayError::configuration(
                "transient_retry_ms must be greater than 0",
            ));
        }
        if let Some(factor) = self.poll_growth_factor {
            if !factor.is_finite() || factor < 1.0 {
                return Err(RelayError::configuration(format!(
                    "poll_growth_factor must be at least 1, got {factor}"
                )));
            }
            if self.poll_step_ms.is_some() {
                return Err(RelayError::configuration(
                    "poll_growth_factor and poll_step_ms are mutually exclusive",
                ));
            }
        }
        if self.max_poll_delay_ms == 0 {
            return Err(RelayError::configuration(
                "max_poll_delay_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Pacing for status polls, bounded by `max_polls` when set.
    ///
    /// A growing interval never exceeds `max_poll_delay_ms`.
    pub fn poll_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.retry_ms);
        let max = Duration::from_millis(self.max_poll_delay_ms);
        let policy = match (self.poll_growth_factor, self.poll_step_ms) {
            (Some(factor), _) => {
                RetryPolicy::new(ExponentialDelay::new(base, factor).with_max(max))
            }
            (None, Some(step)) => RetryPolicy::new(
                LinearDelay::new(base, Duration::from_millis(step)).with_max(max),
            ),
            (None, None) => RetryPolicy::constant(base),
        };
        match self.max_polls {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    /// Delay between retries of transient engine errors.
    pub fn transient_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::constant(Duration::from_millis(self.transient_retry_ms));
        match self.max_transient_retries {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }

    /// Builds the HTTP engine client from `[engine]`.
    pub fn engine_client(&self) -> Result<HttpQueryEngine> {
        let endpoint = self.engine.endpoint.as_deref().ok_or_else(|| {
            RelayError::configuration(format!(
                "Engine endpoint is not configured. Set [engine].endpoint or {ENV_ENGINE_ENDPOINT}"
            ))
        })?;
        let mut config = HttpQueryEngineConfig::new(endpoint)?.with_timeout(self.engine.timeout_secs);
        if let Some(authorization) = &self.engine.authorization {
            config = config.with_authorization(authorization.clone());
        }
        HttpQueryEngine::new(config)
    }

    /// Builds the HTTP object store client from `[store]`.
    pub fn store_client(&self) -> Result<HttpObjectStore> {
        let endpoint = self.store.endpoint.as_deref().ok_or_else(|| {
            RelayError::configuration(format!(
                "Store endpoint is not configured. Set [store].endpoint or {ENV_STORE_ENDPOINT}"
            ))
        })?;
        HttpObjectStore::new(endpoint, self.store.authorization.clone())
    }
}

fn validate_output_location(location: &str) -> Result<()> {
    let bucket = location
        .strip_prefix("s3://")
        .and_then(|rest| rest.split('/').next())
        .filter(|bucket| !bucket.is_empty());
    if bucket.is_none() {
        return Err(RelayError::configuration(format!(
            "output_location must be an s3://bucket/prefix URI, got '{location}'"
        )));
    }
    Ok(())
}

/// Page sizes outside 1..=1000 are rejected by the engine.
pub(crate) fn validate_page_size(page_size: u32) -> Result<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(RelayError::configuration(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }
    Ok(())
}
