// crates/trust-exchange-config/src/config.rs
// ============================================================================
// Module: Trust Exchange Configuration
// Description: Configuration loading and validation for trust-exchange.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url, trust-exchange-core
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys, out-of-range values, and insecure Broker URLs are rejected
//! at load time rather than discovered mid-exchange.
//! Security posture: config inputs are untrusted; the API key may instead be
//! supplied through the environment so it need not live on disk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use trust_exchange_core::InstitutionId;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "trust-exchange.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TRUST_EXCHANGE_CONFIG";
/// Environment variable overriding `broker.api_key`.
pub const API_KEY_ENV_VAR: &str = "TRUST_EXCHANGE_API_KEY";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of the client identifier.
pub(crate) const MAX_CLIENT_ID_LENGTH: usize = 256;
/// Maximum length of the Broker API key.
pub(crate) const MAX_API_KEY_LENGTH: usize = 1024;
/// Maximum connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Maximum request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Maximum response body limit in bytes.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum attempts per transport operation.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 10;
/// Maximum single retry delay in milliseconds.
pub(crate) const MAX_RETRY_DELAY_MS: u64 = 60_000;
/// Maximum backoff multiplier.
pub(crate) const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;
/// Minimum poll interval in milliseconds.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Maximum poll interval in milliseconds.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Maximum approval timeout in milliseconds.
pub(crate) const MAX_APPROVAL_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Top-level trust-exchange configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustExchangeConfig {
    /// Requester identity and key material.
    pub identity: IdentityConfig,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// Provider call limits.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Transport retry settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Approval polling settings.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl TrustExchangeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else `TRUST_EXCHANGE_CONFIG`, else
    /// `trust-exchange.toml`. `TRUST_EXCHANGE_API_KEY`, when set, replaces
    /// `broker.api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let mut config = Self::load_file(&resolved)?;
        config.apply_api_key_override(env::var(API_KEY_ENV_VAR).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses one file without environment overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path, size, encoding, or TOML is
    /// invalid.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses configuration text without validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed or has
    /// unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Replaces the Broker API key when `value` is a non-empty override.
    pub fn apply_api_key_override(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|key| !key.trim().is_empty()) {
            self.broker.api_key = Some(key);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity.validate()?;
        self.broker.validate()?;
        self.provider.validate()?;
        self.retry.validate()?;
        self.polling.validate()?;
        Ok(())
    }

    /// Returns the configured requester identifier.
    #[must_use]
    pub fn client_id(&self) -> InstitutionId {
        InstitutionId::new(self.identity.client_id.trim())
    }
}

/// Requester identity settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Institution identifier issued by the Broker.
    pub client_id: String,
    /// Path to the Ed25519 signing key (32 raw bytes or base64).
    pub signing_key_path: String,
}

impl IdentityConfig {
    /// Validates identity settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let client_id = self.client_id.trim();
        if client_id.is_empty() {
            return Err(ConfigError::Invalid("identity.client_id must be non-empty".to_string()));
        }
        if client_id.len() > MAX_CLIENT_ID_LENGTH {
            return Err(ConfigError::Invalid("identity.client_id exceeds max length".to_string()));
        }
        if client_id.chars().any(char::is_control) {
            return Err(ConfigError::Invalid(
                "identity.client_id must not contain control characters".to_string(),
            ));
        }
        validate_path_string("identity.signing_key_path", &self.signing_key_path)
    }

    /// Returns the signing key path.
    #[must_use]
    pub fn signing_key_path(&self) -> PathBuf {
        PathBuf::from(self.signing_key_path.trim())
    }
}

/// Broker connection settings.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Base URL of the Broker API.
    pub base_url: String,
    /// Bearer token for the Broker API.
    #[serde(default)]
    pub api_key: Option<String>,
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Cap on response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Accept an `http` base URL (local development only).
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl BrokerConfig {
    /// Validates Broker settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("broker.base_url is invalid: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "broker.base_url must use https unless broker.allow_insecure_http is set"
                        .to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "broker.base_url has unsupported scheme {other}"
                )));
            }
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::Invalid("broker.base_url must include a host".to_string()));
        }
        if let Some(api_key) = &self.api_key {
            if api_key.trim().is_empty() {
                return Err(ConfigError::Invalid("broker.api_key must be non-empty".to_string()));
            }
            if api_key.len() > MAX_API_KEY_LENGTH {
                return Err(ConfigError::Invalid("broker.api_key exceeds max length".to_string()));
            }
            if api_key.chars().any(char::is_control) {
                return Err(ConfigError::Invalid(
                    "broker.api_key must not contain control characters".to_string(),
                ));
            }
        }
        validate_timeouts("broker", self.connect_timeout_ms, self.request_timeout_ms)?;
        validate_response_limit("broker", self.max_response_bytes)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

/// Provider call limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Cap on response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Accept `http` Provider endpoints.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            allow_insecure_http: false,
        }
    }
}

impl ProviderConfig {
    /// Validates Provider settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeouts("provider", self.connect_timeout_ms, self.request_timeout_ms)?;
        validate_response_limit("provider", self.max_response_bytes)
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Transport retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per operation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on any single delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Validates retry settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}"
            )));
        }
        if self.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms must be at most {MAX_RETRY_DELAY_MS}"
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite()
            || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff_multiplier)
        {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}"
            )));
        }
        Ok(())
    }

    /// Returns the first retry delay.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the retry delay cap.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Approval polling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Spacing between status reads in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Longest wait for approval in milliseconds.
    #[serde(default = "default_approval_timeout_ms")]
    pub approval_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            approval_timeout_ms: default_approval_timeout_ms(),
        }
    }
}

impl PollingConfig {
    /// Validates polling settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "polling.interval_ms must be between {MIN_POLL_INTERVAL_MS} and \
                 {MAX_POLL_INTERVAL_MS}"
            )));
        }
        if self.approval_timeout_ms < self.interval_ms {
            return Err(ConfigError::Invalid(
                "polling.approval_timeout_ms must be at least polling.interval_ms".to_string(),
            ));
        }
        if self.approval_timeout_ms > MAX_APPROVAL_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "polling.approval_timeout_ms must be at most {MAX_APPROVAL_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns the poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the approval timeout.
    #[must_use]
    pub const fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a connect/request timeout pair.
fn validate_timeouts(section: &str, connect_ms: u64, request_ms: u64) -> Result<(), ConfigError> {
    if connect_ms == 0 || connect_ms > MAX_CONNECT_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{section}.connect_timeout_ms must be between 1 and {MAX_CONNECT_TIMEOUT_MS}"
        )));
    }
    if request_ms == 0 || request_ms > MAX_REQUEST_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{section}.request_timeout_ms must be between 1 and {MAX_REQUEST_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Validates a response size limit.
fn validate_response_limit(section: &str, limit: usize) -> Result<(), ConfigError> {
    if limit == 0 || limit > MAX_RESPONSE_BYTES_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "{section}.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
        )));
    }
    Ok(())
}

/// Default connect timeout.
pub(crate) const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Default request timeout.
pub(crate) const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Default response body limit.
pub(crate) const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

/// Default attempts per operation.
pub(crate) const fn default_max_attempts() -> u32 {
    3
}

/// Default first retry delay.
pub(crate) const fn default_initial_delay_ms() -> u64 {
    200
}

/// Default retry delay cap.
pub(crate) const fn default_max_delay_ms() -> u64 {
    5_000
}

/// Default backoff multiplier.
pub(crate) const fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Default poll interval.
pub(crate) const fn default_poll_interval_ms() -> u64 {
    2_000
}

/// Default approval timeout.
pub(crate) const fn default_approval_timeout_ms() -> u64 {
    60_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================
