//! Configuration Module
//!
//! Loads client settings from environment variables. Command-line flags are
//! applied on top by the binary.

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_TTL_MS;
use crate::data::DEFAULT_API_BASE;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the site API
    pub api_base: String,
    /// Cache directory; `None` means the platform cache directory
    pub cache_dir: Option<PathBuf>,
    /// Cache entry time-to-live in milliseconds
    pub cache_ttl_ms: i64,
    /// Upper bound on bytes the cache may occupy on disk
    pub cache_quota_bytes: Option<u64>,
    /// Whether responses are cached at all
    pub cache_enabled: bool,
    /// Whether debug logging is on
    pub debug: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FOGSIFT_API_BASE` - API base URL (default: http://localhost:3000/api)
    /// - `FOGSIFT_CACHE_DIR` - Cache directory (default: platform cache dir)
    /// - `FOGSIFT_CACHE_TTL_MS` - Entry TTL in milliseconds (default: 3600000)
    /// - `FOGSIFT_CACHE_QUOTA_BYTES` - Cache size limit (default: unlimited)
    /// - `FOGSIFT_NO_CACHE` - Set to `1` or `true` to disable caching
    /// - `FOGSIFT_DEBUG` - Set to `1` or `true` for debug logging
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_base: lookup("FOGSIFT_API_BASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_base),
            cache_dir: lookup("FOGSIFT_CACHE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cache_ttl_ms: lookup("FOGSIFT_CACHE_TTL_MS")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|ttl| *ttl >= 0)
                .unwrap_or(defaults.cache_ttl_ms),
            cache_quota_bytes: lookup("FOGSIFT_CACHE_QUOTA_BYTES").and_then(|v| v.parse().ok()),
            cache_enabled: !lookup("FOGSIFT_NO_CACHE").is_some_and(|v| is_truthy(&v)),
            debug: lookup("FOGSIFT_DEBUG").is_some_and(|v| is_truthy(&v)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            cache_dir: None,
            cache_ttl_ms: DEFAULT_TTL_MS,
            cache_quota_bytes: None,
            cache_enabled: true,
            debug: false,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_base, "http://localhost:3000/api");
        assert_eq!(config.cache_ttl_ms, 3_600_000);
        assert!(config.cache_dir.is_none());
        assert!(config.cache_quota_bytes.is_none());
        assert!(config.cache_enabled);
        assert!(!config.debug);
    }

    #[test]
    fn test_config_empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn test_config_reads_all_variables() {
        let config = config_from(&[
            ("FOGSIFT_API_BASE", "https://fogsift.example/api"),
            ("FOGSIFT_CACHE_DIR", "/tmp/fogsift"),
            ("FOGSIFT_CACHE_TTL_MS", "1000"),
            ("FOGSIFT_CACHE_QUOTA_BYTES", "5242880"),
            ("FOGSIFT_NO_CACHE", "true"),
            ("FOGSIFT_DEBUG", "1"),
        ]);

        assert_eq!(config.api_base, "https://fogsift.example/api");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/fogsift")));
        assert_eq!(config.cache_ttl_ms, 1000);
        assert_eq!(config.cache_quota_bytes, Some(5_242_880));
        assert!(!config.cache_enabled);
        assert!(config.debug);
    }

    #[test]
    fn test_config_invalid_values_fall_back() {
        let config = config_from(&[
            ("FOGSIFT_API_BASE", "  "),
            ("FOGSIFT_CACHE_TTL_MS", "-5"),
            ("FOGSIFT_CACHE_QUOTA_BYTES", "lots"),
            ("FOGSIFT_DEBUG", "maybe"),
        ]);

        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.cache_ttl_ms, DEFAULT_TTL_MS);
        assert!(config.cache_quota_bytes.is_none());
        assert!(!config.debug);
    }
}
