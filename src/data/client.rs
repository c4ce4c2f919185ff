//! Site API client
//!
//! Fetches the site's JSON resources over HTTP, consulting the cache first
//! and storing successful responses in it. Failures are logged and handed
//! back to the caller unchanged; there is no retry and no fallback value.

use std::time::Instant;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::SiteResource;
use crate::cache::CacheManager;

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";

/// Errors that can occur when loading site data
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Response body was not valid JSON
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Results of loading every site resource
#[derive(Debug)]
pub struct SiteBundle {
    /// One result per resource, in `SiteResource::ALL` order
    pub results: Vec<(SiteResource, Result<Value, ApiError>)>,
}

impl SiteBundle {
    /// The loaded data for `resource`, if it succeeded
    pub fn get(&self, resource: SiteResource) -> Option<&Value> {
        self.results
            .iter()
            .find(|(r, _)| *r == resource)
            .and_then(|(_, result)| result.as_ref().ok())
    }

    /// Whether every resource loaded
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    /// Resources that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (SiteResource, &ApiError)> {
        self.results
            .iter()
            .filter_map(|(r, result)| result.as_ref().err().map(|e| (*r, e)))
    }
}

/// Client for loading site data from the API
#[derive(Debug, Clone)]
pub struct DataClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Cache manager for persisting responses
    cache: Option<CacheManager>,
    /// Base URL every resource path is appended to
    base_url: String,
}

impl Default for DataClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl DataClient {
    /// Creates a DataClient without a cache
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http_client: Client::new(),
            cache: None,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Attaches a cache manager
    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The attached cache, if any
    pub fn cache(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }

    /// Loads the wiki index (categories and pages)
    pub async fn load_index(&self) -> Result<Value, ApiError> {
        self.load(SiteResource::Index).await
    }

    /// Loads the navigation sitemap
    pub async fn load_sitemap(&self) -> Result<Value, ApiError> {
        self.load(SiteResource::Sitemap).await
    }

    /// Loads articles and field notes
    pub async fn load_articles(&self) -> Result<Value, ApiError> {
        self.load(SiteResource::Articles).await
    }

    /// Loads site metadata
    pub async fn load_meta(&self) -> Result<Value, ApiError> {
        self.load(SiteResource::Meta).await
    }

    /// Loads a resource, returning cached data when the cache has it
    ///
    /// # Behavior
    /// - A cache hit returns immediately without a network request
    /// - Otherwise the resource is fetched; a non-2xx status is an error
    /// - Successful responses are stored in the cache before returning
    /// - Errors are logged and returned; nothing is cached for them
    pub async fn load(&self, resource: SiteResource) -> Result<Value, ApiError> {
        let endpoint = resource.path();

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get::<Value>(endpoint)) {
            debug!(endpoint, "cache hit");
            return Ok(cached);
        }

        self.refresh(resource).await
    }

    /// Fetches a resource from the network, skipping the cache lookup
    ///
    /// The response still replaces whatever the cache held.
    pub async fn refresh(&self, resource: SiteResource) -> Result<Value, ApiError> {
        let endpoint = resource.path();
        let data = self.fetch_logged(endpoint).await?;

        if let Some(ref cache) = self.cache {
            cache.set(endpoint, &data);
        }
        Ok(data)
    }

    /// Fetches site metadata and records its build as the cache's marker
    ///
    /// When the build differs from the recorded one, cached entries from
    /// the previous build are cleared before the fresh metadata is stored.
    /// Returns the build timestamp found in the metadata, if any.
    pub async fn sync_build(&self) -> Result<Option<i64>, ApiError> {
        let endpoint = SiteResource::Meta.path();
        let meta = self.fetch_logged(endpoint).await?;
        let build = build_timestamp_of(&meta);

        if let Some(ref cache) = self.cache {
            if let Some(build) = build {
                if cache.current_build() != Some(build) {
                    debug!(build, "new build observed");
                    cache.clear();
                    cache.set_build_timestamp(build);
                }
            }
            cache.set(endpoint, &meta);
        }

        Ok(build)
    }

    /// Loads every resource concurrently
    ///
    /// A failure for one resource does not stop the others.
    pub async fn load_all(&self) -> SiteBundle {
        let loads = SiteResource::ALL.iter().map(|resource| self.load(*resource));
        let results = futures::future::join_all(loads).await;

        SiteBundle {
            results: SiteResource::ALL.into_iter().zip(results).collect(),
        }
    }

    /// Fetches an endpoint, logging timing on success and the error on failure
    async fn fetch_logged(&self, endpoint: &str) -> Result<Value, ApiError> {
        let started = Instant::now();

        match self.fetch_from_api(endpoint).await {
            Ok((status, data)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(endpoint, status, elapsed_ms, "api");
                Ok(data)
            }
            Err(e) => {
                warn!(endpoint, error = %e, "api request failed");
                Err(e)
            }
        }
    }

    /// Fetches an endpoint directly from the API
    async fn fetch_from_api(&self, endpoint: &str) -> Result<(u16, Value), ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.http_client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let text = response.text().await?;
        let data = serde_json::from_str(&text)?;
        Ok((status.as_u16(), data))
    }
}

/// Reads the integer `buildTimestamp` field of site metadata
fn build_timestamp_of(meta: &Value) -> Option<i64> {
    match meta.get("buildTimestamp")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
