//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.r2r-mcp/config.toml` (user)
//! 3. Built-in defaults
//!
//! Environment variables are applied on top of whatever was loaded:
//! `R2R_BASE_URL`, `API_KEY`, `TIMEOUT`, `MAX_RETRIES`,
//! `RATE_LIMIT_PER_MINUTE`, `CACHE_TTL`, `CACHE_MAX_ENTRIES`, `HTTP_ADDRESS`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::middleware::{RateLimitConfig, RetryConfig};
use crate::{R2rError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub middleware: MiddlewareConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Upstream R2R service.
#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the R2R API (default: http://localhost:7272).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token. Omitted from requests when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_timeout")]
    pub timeout_secs: f64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:7272".to_string()
}

fn default_timeout() -> f64 {
    120.0
}

/// Longest cache TTL the cache backend accepts (1000 years).
pub const MAX_CACHE_TTL_SECS: u64 = 1000 * 365 * 24 * 60 * 60;

/// Pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct MiddlewareConfig {
    /// Retries after the first attempt (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-source ceiling within a trailing 60s window (default: 100).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// Tool-result time-to-live in seconds (default: 300).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Optional cache capacity. Unbounded when unset.
    #[serde(default)]
    pub cache_max_entries: Option<u64>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            rate_limit_per_minute: default_rate_limit(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_entries: None,
        }
    }
}

impl MiddlewareConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new().max_retries(self.max_retries)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.rate_limit_per_minute)
    }

    pub fn cache(&self) -> CacheConfig {
        let config = CacheConfig::new().ttl(Duration::from_secs(self.cache_ttl_secs));
        match self.cache_max_entries {
            Some(n) => config.max_entries(n),
            None => config,
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_rate_limit() -> u32 {
    100
}

fn default_cache_ttl() -> u64 {
    300
}

/// REST facade settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to (default: 0.0.0.0:8001).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8001".to_string()
}

impl Config {
    /// Load configuration from the standard locations, then apply process
    /// environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            R2rError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            R2rError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path. `None` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(R2rError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".r2r-mcp").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }

    /// Apply environment-style overrides read through `lookup`, then validate.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("R2R_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(key) = lookup("API_KEY") {
            self.upstream.api_key = (!key.is_empty()).then_some(key);
        }
        if let Some(v) = lookup("TIMEOUT") {
            self.upstream.timeout_secs = parse_var("TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            self.middleware.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RATE_LIMIT_PER_MINUTE") {
            self.middleware.rate_limit_per_minute = parse_var("RATE_LIMIT_PER_MINUTE", &v)?;
        }
        if let Some(v) = lookup("CACHE_TTL") {
            self.middleware.cache_ttl_secs = parse_var("CACHE_TTL", &v)?;
        }
        if let Some(v) = lookup("CACHE_MAX_ENTRIES") {
            self.middleware.cache_max_entries = Some(parse_var("CACHE_MAX_ENTRIES", &v)?);
        }
        if let Some(addr) = lookup("HTTP_ADDRESS") {
            self.http.address = addr;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(R2rError::Configuration("base_url must not be empty".into()));
        }
        let timeout = self.upstream.timeout_secs;
        if !(timeout > 0.0 && Duration::try_from_secs_f64(timeout).is_ok()) {
            return Err(R2rError::Configuration(format!(
                "timeout_secs must be a positive number of seconds, got {timeout}"
            )));
        }
        if self.middleware.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(R2rError::Configuration(format!(
                "cache_ttl_secs must be at most {MAX_CACHE_TTL_SECS}, got {}",
                self.middleware.cache_ttl_secs
            )));
        }
        if self.middleware.rate_limit_per_minute == 0 {
            return Err(R2rError::Configuration(
                "rate_limit_per_minute must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| R2rError::Configuration(format!("Invalid {name} value '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.upstream.base_url, "http://localhost:7272");
        assert!(config.upstream.api_key.is_none());
        assert_eq!(config.upstream.timeout(), Duration::from_secs(120));
        assert_eq!(config.middleware.max_retries, 2);
        assert_eq!(config.middleware.rate_limit_per_minute, 100);
        assert_eq!(config.middleware.cache_ttl_secs, 300);
        assert_eq!(config.http.address, "0.0.0.0:8001");
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [upstream]
            base_url = "http://r2r.internal:7272"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.upstream.base_url, "http://r2r.internal:7272");
        // Defaults preserved
        assert_eq!(config.middleware.rate_limit_per_minute, 100);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [upstream]
            base_url = "https://r2r.example.com"
            api_key = "secret"
            timeout_secs = 30.5

            [middleware]
            max_retries = 4
            rate_limit_per_minute = 60
            cache_ttl_secs = 10
            cache_max_entries = 500

            [http]
            address = "127.0.0.1:9000"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.upstream.api_key.as_deref(), Some("secret"));
        assert_eq!(config.upstream.timeout(), Duration::from_secs_f64(30.5));
        assert_eq!(config.middleware.max_retries, 4);
        assert_eq!(config.middleware.cache_max_entries, Some(500));
        assert_eq!(config.middleware.cache().max_entries, Some(500));
        assert_eq!(config.middleware.retry().max_retries, 4);
        assert_eq!(config.http.address, "127.0.0.1:9000");
    }

    #[test]
    fn env_overrides_file_values() {
        let config = Config::default()
            .with_env(lookup(&[
                ("R2R_BASE_URL", "http://override:1"),
                ("API_KEY", "k"),
                ("MAX_RETRIES", "5"),
                ("CACHE_TTL", "60"),
            ]))
            .unwrap();
        assert_eq!(config.upstream.base_url, "http://override:1");
        assert_eq!(config.upstream.api_key.as_deref(), Some("k"));
        assert_eq!(config.middleware.max_retries, 5);
        assert_eq!(config.middleware.cache_ttl_secs, 60);
    }

    #[test]
    fn empty_api_key_means_unset() {
        let config = Config::default()
            .with_env(lookup(&[("API_KEY", "")]))
            .unwrap();
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn unparsable_env_value_is_rejected() {
        let err = Config::default()
            .with_env(lookup(&[("TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("TIMEOUT"));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let result = Config::default().with_env(lookup(&[("RATE_LIMIT_PER_MINUTE", "0")]));
        assert!(matches!(result, Err(R2rError::Configuration(_))));
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        for value in ["1e20", "inf", "-1"] {
            let result = Config::default().with_env(lookup(&[("TIMEOUT", value)]));
            assert!(
                matches!(result, Err(R2rError::Configuration(_))),
                "TIMEOUT={value} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_cache_ttl_is_rejected() {
        let result = Config::default().with_env(lookup(&[("CACHE_TTL", "99999999999")]));
        assert!(matches!(result, Err(R2rError::Configuration(_))));

        let limit = MAX_CACHE_TTL_SECS.to_string();
        let at_limit = Config::default()
            .with_env(lookup(&[("CACHE_TTL", limit.as_str())]))
            .unwrap();
        assert_eq!(at_limit.middleware.cache_ttl_secs, MAX_CACHE_TTL_SECS);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let upstream = UpstreamConfig {
            api_key: Some("super-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{upstream:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[upstream]\nbase_url = \"http://from-file:7272\"\n\n[middleware]\nmax_retries = 1\n",
        )
        .unwrap();

        let config = Config::from_file(&path)
            .unwrap()
            .with_env(lookup(&[("MAX_RETRIES", "3")]))
            .unwrap();
        assert_eq!(config.upstream.base_url, "http://from-file:7272");
        assert_eq!(config.middleware.max_retries, 3);
    }

    #[test]
    fn malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[upstream\nbase_url = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, R2rError::Configuration(ref m) if m.contains("parse")));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
