//! Command-line interface parsing for the FogSift client
//!
//! This module handles parsing of CLI arguments using clap: global flags that
//! override the environment configuration, and one subcommand per action.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::Config;
use crate::data::SiteResource;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified resource name is not recognized
    #[error("Invalid resource: '{0}'. Valid resources: index, sitemap, articles, meta")]
    InvalidResource(String),
}

/// FogSift client - load site data through the local cache
#[derive(Parser, Debug)]
#[command(name = "fogsift")]
#[command(about = "Load FogSift site data with a persistent local cache")]
#[command(version)]
pub struct Cli {
    /// Base URL of the site API (overrides FOGSIFT_API_BASE)
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// Directory for cached responses (overrides FOGSIFT_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache entry time-to-live in milliseconds (overrides FOGSIFT_CACHE_TTL_MS)
    #[arg(long, global = true, value_name = "MS", value_parser = clap::value_parser!(i64).range(0..))]
    pub ttl_ms: Option<i64>,

    /// Do not read from or write to the cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Actions the client can perform
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load one resource and print it as JSON
    ///
    /// Valid resources: index, sitemap, articles, meta
    Load {
        #[arg(value_parser = parse_resource_arg)]
        resource: SiteResource,

        /// Skip the cache lookup and fetch from the network
        #[arg(long)]
        fresh: bool,
    },
    /// Fetch site metadata and record its build, invalidating older entries
    Sync,
    /// Load every resource concurrently and report the outcome of each
    All,
    /// Re-sync and reload periodically until interrupted
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
    /// Inspect or modify the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Cache maintenance actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// List cached keys
    List,
    /// Remove every cached entry, keeping the build marker
    Clear,
    /// Remove every cached entry and the build marker
    Reset,
    /// Report whether a key holds fresh data
    Check { key: String },
    /// Remove a single cached entry
    Evict { key: String },
}

/// Parses a resource string argument into a SiteResource.
///
/// # Arguments
/// * `s` - The resource string from CLI
///
/// # Returns
/// * `Ok(SiteResource)` if the string matches a resource or alias
/// * `Err(CliError::InvalidResource)` if the string doesn't match
pub fn parse_resource_arg(s: &str) -> Result<SiteResource, CliError> {
    SiteResource::from_str(s).ok_or_else(|| CliError::InvalidResource(s.to_string()))
}

impl Cli {
    /// Applies the global flags on top of a configuration
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(ref api_base) = self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(ref cache_dir) = self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(ttl_ms) = self.ttl_ms {
            config.cache_ttl_ms = ttl_ms;
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
        if self.verbose {
            config.debug = true;
        }
        config
    }
}
