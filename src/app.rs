//! Application composition and command execution
//!
//! Builds the cache and data client from a `Config` and runs one CLI
//! command against them, writing human-readable output to a writer.

use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheManager, FileStorage};
use crate::cli::{CacheCommand, Command};
use crate::config::Config;
use crate::data::{ApiError, DataClient};

/// Errors surfaced by a command run
#[derive(Debug, Error)]
pub enum AppError {
    /// Loading site data failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Some resources of a bulk load failed
    #[error("{failed} of {total} resources failed to load")]
    Incomplete { failed: usize, total: usize },

    /// Output could not be rendered as JSON
    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    /// Output could not be written
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),

    /// A cache command was given but caching is disabled
    #[error("Cache is disabled")]
    CacheDisabled,
}

/// Main application state
#[derive(Debug, Clone)]
pub struct App {
    /// Configuration the app was built from
    pub config: Config,
    /// Site data client, with the cache attached when enabled
    client: DataClient,
}

impl App {
    /// Creates the cache and client described by `config`
    pub fn from_config(config: Config) -> Self {
        let cache = if config.cache_enabled {
            build_cache(&config)
        } else {
            None
        };

        let client = match cache {
            Some(cache) => DataClient::new(config.api_base.clone()).with_cache(cache),
            None => DataClient::new(config.api_base.clone()),
        };

        info!(
            api_base = client.base_url(),
            cached = client.cache().is_some(),
            "client ready"
        );

        Self { config, client }
    }

    /// Creates an App around an existing client (for testing)
    pub fn with_client(config: Config, client: DataClient) -> Self {
        Self { config, client }
    }

    /// The site data client
    pub fn client(&self) -> &DataClient {
        &self.client
    }

    /// Runs a single command, writing its output to `out`
    ///
    /// `Command::Watch` is long-running and handled by the binary; here it
    /// performs one refresh cycle.
    pub async fn run<W: Write>(&self, command: &Command, out: &mut W) -> Result<(), AppError> {
        debug!(?command, "running command");
        match command {
            Command::Load { resource, fresh } => {
                let data = if *fresh {
                    self.client.refresh(*resource).await?
                } else {
                    self.client.load(*resource).await?
                };
                writeln!(out, "{}", serde_json::to_string_pretty(&data)?)?;
            }
            Command::Sync => match self.client.sync_build().await? {
                Some(build) => writeln!(out, "build {}", build)?,
                None => writeln!(out, "no build timestamp in site metadata")?,
            },
            Command::All | Command::Watch { .. } => {
                let bundle = self.client.load_all().await;
                for (resource, result) in &bundle.results {
                    match result {
                        Ok(_) => writeln!(out, "{:<10} ok", resource.name())?,
                        Err(e) => writeln!(out, "{:<10} error: {}", resource.name(), e)?,
                    }
                }
                let failed = bundle.failures().count();
                if failed > 0 {
                    return Err(AppError::Incomplete {
                        failed,
                        total: bundle.results.len(),
                    });
                }
            }
            Command::Cache(cache_command) => {
                let cache = self.client.cache().ok_or(AppError::CacheDisabled)?;
                run_cache_command(cache, cache_command, out)?;
            }
        }
        Ok(())
    }
}

/// Builds the cache manager for `config`, `None` if no location is known
fn build_cache(config: &Config) -> Option<CacheManager> {
    let cache = match (&config.cache_dir, config.cache_quota_bytes) {
        (Some(dir), Some(quota)) => {
            CacheManager::new(Arc::new(FileStorage::new(dir.clone()).with_quota(quota)))
        }
        (Some(dir), None) => CacheManager::with_dir(dir.clone()),
        (None, _) => CacheManager::open_default()?,
    };
    Some(cache.with_ttl_ms(config.cache_ttl_ms))
}

fn run_cache_command<W: Write>(
    cache: &CacheManager,
    command: &CacheCommand,
    out: &mut W,
) -> Result<(), AppError> {
    match command {
        CacheCommand::List => {
            if let Some(build) = cache.current_build() {
                writeln!(out, "build {}", build)?;
            }
            for key in cache.keys() {
                writeln!(out, "{}", key)?;
            }
        }
        CacheCommand::Clear => {
            cache.clear();
            writeln!(out, "cache cleared")?;
        }
        CacheCommand::Reset => {
            cache.reset();
            writeln!(out, "cache reset")?;
        }
        CacheCommand::Check { key } => {
            let state = if cache.is_valid(key) { "valid" } else { "missing" };
            writeln!(out, "{} {}", key, state)?;
        }
        CacheCommand::Evict { key } => {
            cache.remove(key);
            writeln!(out, "{} evicted", key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::data::SiteResource;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_with_memory_cache(base_url: &str) -> (App, CacheManager) {
        let cache = CacheManager::new(Arc::new(MemoryStorage::new()));
        let client = DataClient::new(base_url).with_cache(cache.clone());
        (App::with_client(Config::default(), client), cache)
    }

    async fn run_to_string(app: &App, command: Command) -> (Result<(), AppError>, String) {
        let mut out = Vec::new();
        let result = app.run(&command, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_from_config_with_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            cache_dir: Some(temp_dir.path().to_path_buf()),
            cache_ttl_ms: 1234,
            ..Config::default()
        };

        let app = App::from_config(config);

        let cache = app.client().cache().expect("cache should be enabled");
        assert_eq!(cache.ttl_ms(), 1234);
        cache.set("k", &1);
        assert!(temp_dir.path().join("fogsift_k").exists());
    }

    #[test]
    fn test_from_config_without_cache() {
        let config = Config {
            cache_enabled: false,
            ..Config::default()
        };
        let app = App::from_config(config);
        assert!(app.client().cache().is_none());
    }

    #[tokio::test]
    async fn test_run_load_prints_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pages": ["a"]})))
            .mount(&mock_server)
            .await;

        let (app, _cache) = app_with_memory_cache(&mock_server.uri());
        let (result, output) = run_to_string(
            &app,
            Command::Load {
                resource: SiteResource::Index,
                fresh: false,
            },
        )
        .await;

        assert!(result.is_ok());
        let printed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(printed, json!({"pages": ["a"]}));
    }

    #[tokio::test]
    async fn test_run_all_reports_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        for ok_path in ["/wiki/index.json", "/wiki/sitemap.json", "/articles.json"] {
            Mock::given(method("GET"))
                .and(path(ok_path))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(&mock_server)
                .await;
        }

        let (app, _cache) = app_with_memory_cache(&mock_server.uri());
        let (result, output) = run_to_string(&app, Command::All).await;

        assert!(matches!(
            result,
            Err(AppError::Incomplete { failed: 1, total: 4 })
        ));
        assert!(output.contains("index      ok"));
        assert!(output.contains("meta       error: HTTP 500"));
    }

    #[tokio::test]
    async fn test_run_cache_commands() {
        let (app, cache) = app_with_memory_cache("http://127.0.0.1:9");
        cache.set_build_timestamp(77);
        cache.set("/meta.json", &json!({}));

        let (_, listed) = run_to_string(&app, Command::Cache(CacheCommand::List)).await;
        assert_eq!(listed, "build 77\n/meta.json\n");

        let check = Command::Cache(CacheCommand::Check {
            key: "/meta.json".to_string(),
        });
        let (_, checked) = run_to_string(&app, check.clone()).await;
        assert_eq!(checked, "/meta.json valid\n");

        let evict = Command::Cache(CacheCommand::Evict {
            key: "/meta.json".to_string(),
        });
        run_to_string(&app, evict).await.0.unwrap();
        let (_, checked) = run_to_string(&app, check).await;
        assert_eq!(checked, "/meta.json missing\n");
    }

    #[tokio::test]
    async fn test_cache_command_without_cache_fails() {
        let app = App::with_client(Config::default(), DataClient::new("http://127.0.0.1:9"));
        let (result, _) = run_to_string(&app, Command::Cache(CacheCommand::Clear)).await;
        assert!(matches!(result, Err(AppError::CacheDisabled)));
    }
}
