//! Resolver configuration.

use std::path::PathBuf;
use std::time::Duration;

use ratewise_common::{constants, DurationExt};

use crate::http::DEFAULT_ENDPOINT;

/// Configuration for building a [`crate::RateResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Live rate endpoint; the base code is appended as a path segment.
    pub endpoint: String,
    /// Upper bound on a single live fetch.
    pub fetch_timeout: Duration,
    /// How long a fetched table is served from cache.
    pub cache_ttl: chrono::Duration,
    /// Directory for the persistent cache. In-memory when unset.
    pub cache_dir: Option<PathBuf>,
    /// Skip the network entirely and answer from cache or fallback.
    pub offline: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fetch_timeout: constants::fetch_timeout().as_std(),
            cache_ttl: constants::cache_ttl(),
            cache_dir: None,
            offline: false,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("RATEWISE_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(secs) = std::env::var("RATEWISE_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.fetch_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(secs) = std::env::var("RATEWISE_CACHE_TTL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.cache_ttl = chrono::Duration::seconds(secs);
            }
        }

        if let Ok(dir) = std::env::var("RATEWISE_CACHE_DIR") {
            if !dir.is_empty() {
                config.cache_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(flag) = std::env::var("RATEWISE_OFFLINE") {
            config.offline = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.offline && self.endpoint.trim().is_empty() {
            return Err("Endpoint cannot be empty".to_string());
        }

        if !self.offline
            && !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://"))
        {
            return Err(format!("Endpoint must be an http(s) URL: {}", self.endpoint));
        }

        if self.fetch_timeout.is_zero() {
            return Err("Fetch timeout cannot be 0".to_string());
        }

        if self.cache_ttl <= chrono::Duration::zero() {
            return Err("Cache TTL must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_ttl, chrono::Duration::hours(24));
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ResolverConfig::default();
        config.fetch_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.endpoint = "ftp://rates".to_string();
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.cache_ttl = chrono::Duration::zero();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_offline_ignores_endpoint() {
        let config = ResolverConfig {
            endpoint: String::new(),
            offline: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
