//! Configuration management for Floodgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{Policy, RetryConfig};

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid default address")
}

/// What to do with a request when the store is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Let the request through. Infrastructure hiccups never block the
    /// application; this is the reference deployment's choice.
    #[default]
    Open,
    /// Reject the request until the store recovers.
    Closed,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Connection string for the shared store. Absent means rate
    /// limiting is inert: every request is allowed.
    pub store_url: Option<String>,

    /// Behavior when the store cannot be reached
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Retries per check after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Timeout per store operation in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Policy applied to vote submission
    #[serde(default = "default_vote_policy")]
    pub vote: PolicyConfig,

    /// Policy applied to number fetches
    #[serde(default = "default_numbers_policy")]
    pub numbers: PolicyConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            failure_mode: FailureMode::default(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            op_timeout_ms: default_op_timeout_ms(),
            vote: default_vote_policy(),
            numbers: default_numbers_policy(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

fn default_op_timeout_ms() -> u64 {
    250
}

fn default_vote_policy() -> PolicyConfig {
    PolicyConfig {
        max_permits: 10,
        window_ms: 60_000,
    }
}

fn default_numbers_policy() -> PolicyConfig {
    PolicyConfig {
        max_permits: 30,
        window_ms: 60_000,
    }
}

/// A named policy's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub max_permits: u32,
    pub window_ms: u64,
}

impl PolicyConfig {
    /// Materialize as a [`Policy`] under the given name.
    pub fn to_policy(&self, name: &str) -> Policy {
        Policy::new(name, self.max_permits, Duration::from_millis(self.window_ms))
    }
}

impl LimiterConfig {
    /// Retry budget for the limiter.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
        }
    }
}

impl FloodgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| FloodgateError::Config(e.to_string()))
    }

    /// Apply `FLOODGATE_*` environment overrides.
    ///
    /// `FLOODGATE_STORE_URL` toggles limiting on; `FLOODGATE_FAILURE_MODE`
    /// accepts `open` or `closed`; `FLOODGATE_LISTEN_ADDR` overrides the
    /// bind address.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FLOODGATE_STORE_URL") {
            if !url.is_empty() {
                self.limiter.store_url = Some(url);
            }
        }
        if let Ok(mode) = std::env::var("FLOODGATE_FAILURE_MODE") {
            self.limiter.failure_mode = match mode.as_str() {
                "open" => FailureMode::Open,
                "closed" => FailureMode::Closed,
                other => {
                    return Err(FloodgateError::Config(format!(
                        "unknown failure mode '{other}'"
                    )))
                }
            };
        }
        if let Ok(addr) = std::env::var("FLOODGATE_LISTEN_ADDR") {
            self.server.listen_addr = addr
                .parse()
                .map_err(|_| FloodgateError::Config(format!("invalid listen address '{addr}'")))?;
        }
        Ok(())
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_inert_and_fail_open() {
        let config = FloodgateConfig::default();
        assert!(config.limiter.store_url.is_none());
        assert_eq!(config.limiter.failure_mode, FailureMode::Open);
        assert_eq!(config.limiter.vote.max_permits, 10);
        assert_eq!(config.limiter.numbers.max_permits, 30);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9090"
limiter:
  store_url: "memory"
  failure_mode: closed
  vote:
    max_permits: 5
    window_ms: 30000
"#;
        let config = FloodgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9090);
        assert_eq!(config.limiter.store_url.as_deref(), Some("memory"));
        assert_eq!(config.limiter.failure_mode, FailureMode::Closed);
        assert_eq!(config.limiter.vote.max_permits, 5);
        // Unspecified sections keep their defaults.
        assert_eq!(config.limiter.numbers.max_permits, 30);
        assert_eq!(config.limiter.max_retries, 3);
    }

    #[test]
    fn test_policy_config_materializes() {
        let policy = default_vote_policy().to_policy("vote");
        assert_eq!(policy.name, "vote");
        assert_eq!(policy.max_permits, 10);
        assert_eq!(policy.window_ms(), 60_000);
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(FloodgateConfig::from_yaml("limiter: [not, a, map]").is_err());
    }
}
