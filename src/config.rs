//! Configuration management for the MCP HTTP proxy
//!
//! Resolves the upstream selector into an origin URL and per-call deadline.

use std::time::Duration;

use validator::Validate;

use crate::error::{ConfigError, Result};

/// Suffix appended to the uppercased selector to form the origin env var
pub const ORIGIN_ENV_SUFFIX: &str = "_API_URL";

/// Default upstream call deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the proxy
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// Name of the upstream being proxied (e.g. "assistant")
    pub selector: String,

    /// Environment variable the origin URL was read from
    pub origin_env_var: String,

    /// JSON-RPC endpoint of the origin
    #[validate(url)]
    pub origin_url: String,

    /// Deadline applied to every upstream call; `None` disables it
    pub timeout: Option<Duration>,
}

impl Config {
    /// Build configuration from the process environment
    pub fn from_env(selector: &str, timeout_secs: u64) -> Result<Self> {
        Self::from_lookup(selector, timeout_secs, |var| std::env::var(var).ok())
    }

    /// Build configuration using `lookup` to resolve environment variables
    pub fn from_lookup<F>(selector: &str, timeout_secs: u64, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ConfigError::MissingSelector.into());
        }

        let origin_env_var = origin_env_var(selector);
        let origin_url = lookup(&origin_env_var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                var: origin_env_var.clone(),
            })?;

        let timeout = match timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let config = Self {
            selector: selector.to_string(),
            origin_env_var,
            origin_url,
            timeout,
        };
        config.check_origin()?;

        Ok(config)
    }

    fn check_origin(&self) -> Result<()> {
        let invalid = |message: String| ConfigError::InvalidUrl {
            url: self.origin_url.clone(),
            message,
        };

        self.validate().map_err(|e| invalid(e.to_string()))?;

        let url = reqwest::Url::parse(&self.origin_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(invalid(format!("unsupported scheme '{}'", other)).into()),
        }
    }
}

/// Environment variable holding the origin URL for `selector`
///
/// `assistant` maps to `ASSISTANT_API_URL`, `my-service` to `MY_SERVICE_API_URL`.
pub fn origin_env_var(selector: &str) -> String {
    let name: String = selector
        .trim()
        .chars()
        .map(|c| match c {
            '-' | '.' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("{}{}", name, ORIGIN_ENV_SUFFIX)
}
