//! Configuration management for yourMoment.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.yourmoment/config.toml`)
//! 3. Environment variable overrides (`YOURMOMENT_` prefix, `__` for nesting)
//!
//! CLI flag overrides are applied by the binary crate after loading.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the yourMoment pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Upstream scraping target settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Global rate limiter settings.
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,

    /// Scheduler tick settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Per-process duration constraints.
    #[serde(default)]
    pub process: ProcessConfig,

    /// Posting stage settings (backoff, inter-post delay).
    #[serde(default)]
    pub posting: PostingConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The required disclosure prefix prepended to every generated comment.
    #[serde(default = "default_disclosure_prefix")]
    pub disclosure_prefix: String,

    /// Base64-encoded AES-256-GCM key for the credential vault.
    ///
    /// Must be set via `YOURMOMENT_VAULT_KEY`; has no safe built-in default.
    #[serde(default)]
    pub vault_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            scheduler: SchedulerConfig::default(),
            process: ProcessConfig::default(),
            posting: PostingConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            disclosure_prefix: default_disclosure_prefix(),
            vault_key: None,
        }
    }
}

fn default_disclosure_prefix() -> String {
    "[Dieser Kommentar stammt von einem KI-ChatBot.]".to_string()
}

/// Settings for reaching the upstream school-writing platform.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream platform.
    pub base_url: String,
    /// Login form / login submit path.
    pub login_path: String,
    /// Per-HTTP-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum redirect hops the session registry will follow.
    pub max_redirect_hops: u8,
    /// Maximum upstream sessions held concurrently.
    pub max_concurrent_sessions: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://new.mymoment.ch".to_string(),
            login_path: "/accounts/login/".to_string(),
            request_timeout_secs: 30,
            max_redirect_hops: 5,
            max_concurrent_sessions: 5,
        }
    }
}

/// Settings for the global upstream rate limiter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimiterConfig {
    /// Maximum sustained requests per second to the upstream platform.
    pub requests_per_second: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
        }
    }
}

/// Settings for the periodic scheduler tick.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    pub tick_period_secs: u64,
    /// Maximum articles requested per Discovery call.
    pub max_articles_per_request: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_secs: 60,
            max_articles_per_request: 20,
        }
    }
}

/// Constraints on monitoring process duration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    /// Default duration assigned if the caller does not specify one.
    pub default_duration_minutes: u32,
    /// Hard upper bound on `max_duration_minutes`.
    pub max_duration_minutes: u32,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            max_duration_minutes: 1440,
        }
    }
}

/// Settings for the Posting stage worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostingConfig {
    /// Delay between consecutive posts within one Posting run.
    pub inter_post_delay_secs: u64,
    /// Base delay for exponential backoff after a stage-level failure.
    pub backoff_base_secs: u64,
    /// Cap on exponential backoff delay.
    pub backoff_cap_secs: u64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            inter_post_delay_secs: 30,
            backoff_base_secs: 60,
            backoff_cap_secs: 600,
        }
    }
}

/// SQLite storage location and pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file (tilde-expanded).
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "~/.yourmoment/yourmoment.db".to_string(),
        }
    }
}

/// Logging verbosity and format settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (e.g. "info", "yourmoment_core=debug").
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: built-in defaults, then an optional TOML file,
    /// then `YOURMOMENT_*` environment variable overrides.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let resolved_path = resolve_config_path(path);
        if let Some(resolved_path) = resolved_path {
            if resolved_path.exists() {
                let text = std::fs::read_to_string(&resolved_path).map_err(|_| {
                    ConfigError::FileNotFound {
                        path: resolved_path.display().to_string(),
                    }
                })?;
                config = toml::from_str(&text)
                    .map_err(|source| ConfigError::ParseError { source })?;
            } else if path.is_some() {
                return Err(ConfigError::FileNotFound {
                    path: resolved_path.display().to_string(),
                });
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load and validate configuration in one step.
    pub fn load_and_validate(path: Option<&str>) -> Result<Self, Vec<ConfigError>> {
        let config = Self::load(path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `YOURMOMENT_*` environment variable overrides in place.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("YOURMOMENT_UPSTREAM__BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Some(v) = parse_env_u64("YOURMOMENT_UPSTREAM__REQUEST_TIMEOUT_SECS") {
            self.upstream.request_timeout_secs = v;
        }
        if let Some(v) = parse_env_f64("YOURMOMENT_RATE_LIMITER__REQUESTS_PER_SECOND") {
            self.rate_limiter.requests_per_second = v;
        }
        if let Some(v) = parse_env_u64("YOURMOMENT_SCHEDULER__TICK_PERIOD_SECS") {
            self.scheduler.tick_period_secs = v;
        }
        if let Some(v) = parse_env_u32("YOURMOMENT_PROCESS__MAX_DURATION_MINUTES") {
            self.process.max_duration_minutes = v;
        }
        if let Ok(v) = env::var("YOURMOMENT_STORAGE__DATABASE_PATH") {
            self.storage.database_path = v;
        }
        if let Ok(v) = env::var("YOURMOMENT_LOGGING__LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = env::var("YOURMOMENT_DISCLOSURE_PREFIX") {
            self.disclosure_prefix = v;
        }
        if let Ok(v) = env::var("YOURMOMENT_VAULT_KEY") {
            self.vault_key = Some(v);
        }
    }

    /// Validate the configuration, collecting every violation instead of
    /// failing on the first.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.upstream.base_url.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "upstream.base_url".to_string(),
            });
        }
        if self.rate_limiter.requests_per_second <= 0.0 {
            errors.push(ConfigError::InvalidValue {
                field: "rate_limiter.requests_per_second".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.scheduler.tick_period_secs == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.tick_period_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.process.max_duration_minutes == 0 || self.process.max_duration_minutes > 1440 {
            errors.push(ConfigError::InvalidValue {
                field: "process.max_duration_minutes".to_string(),
                message: "must be between 1 and 1440".to_string(),
            });
        }
        if self.disclosure_prefix.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "disclosure_prefix".to_string(),
            });
        }
        if self.vault_key.is_none() {
            errors.push(ConfigError::MissingField {
                field: "vault_key".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Expand the storage database path (handles a leading `~`).
    pub fn database_path(&self) -> PathBuf {
        expand_tilde(&self.storage.database_path)
    }
}

/// Resolve the config file path: explicit path, or the default
/// `~/.yourmoment/config.toml` if no explicit path was given.
fn resolve_config_path(path: Option<&str>) -> Option<PathBuf> {
    match path {
        Some(p) => Some(expand_tilde(p)),
        None => dirs::home_dir().map(|home| home.join(".yourmoment").join("config.toml")),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Build a `Config` suitable for tests: in-memory storage path, fixed
/// vault key, short scheduler period.
#[cfg(any(test, feature = "test-helpers"))]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.database_path = ":memory:".to_string();
    config.vault_key = Some(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        [0u8; 32],
    ));
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.upstream.base_url, "https://new.mymoment.ch");
        assert_eq!(config.rate_limiter.requests_per_second, 2.0);
        assert_eq!(config.scheduler.tick_period_secs, 60);
        assert_eq!(config.process.max_duration_minutes, 1440);
        assert_eq!(
            config.disclosure_prefix,
            "[Dieser Kommentar stammt von einem KI-ChatBot.]"
        );
    }

    #[test]
    fn validate_rejects_missing_vault_key() {
        let config = Config::default();
        let errors = config.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingField { field } if field == "vault_key")));
    }

    #[test]
    fn validate_accepts_fully_populated_config() {
        let mut config = Config::default();
        config.vault_key = Some("a-base64-key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_duration() {
        let mut config = Config::default();
        config.vault_key = Some("k".to_string());
        config.process.max_duration_minutes = 1441;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "process.max_duration_minutes"
        )));
    }

    #[test]
    fn validate_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.vault_key = Some("k".to_string());
        config.rate_limiter.requests_per_second = 0.0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "rate_limiter.requests_per_second"
        )));
    }

    #[test]
    fn expand_tilde_without_tilde_is_unchanged() {
        let expanded = expand_tilde("/etc/yourmoment/config.toml");
        assert_eq!(expanded, PathBuf::from("/etc/yourmoment/config.toml"));
    }

    #[test]
    fn parse_toml_overrides_defaults() {
        let toml_text = r#"
            disclosure_prefix = "custom prefix"

            [rate_limiter]
            requests_per_second = 5.0
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.disclosure_prefix, "custom prefix");
        assert_eq!(config.rate_limiter.requests_per_second, 5.0);
        // Fields omitted from the TOML fall back to their defaults.
        assert_eq!(config.upstream.base_url, "https://new.mymoment.ch");
    }
}
