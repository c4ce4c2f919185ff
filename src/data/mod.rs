//! Site data access for FogSift
//!
//! This module names the JSON resources the site API serves and provides the
//! `DataClient` that loads them, going through the cache when one is attached.

pub mod client;

pub use client::{ApiError, DataClient, SiteBundle, DEFAULT_API_BASE};

use serde::{Deserialize, Serialize};

/// A JSON resource published by the site API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteResource {
    /// Wiki categories and pages
    Index,
    /// Navigation sitemap with pre-computed numbering
    Sitemap,
    /// Articles and field notes
    Articles,
    /// Site metadata (version, build timestamp)
    Meta,
}

impl SiteResource {
    /// Every resource, in load order
    pub const ALL: [SiteResource; 4] = [
        SiteResource::Index,
        SiteResource::Sitemap,
        SiteResource::Articles,
        SiteResource::Meta,
    ];

    /// Path of the resource beneath the API base; also its cache key
    pub fn path(&self) -> &'static str {
        match self {
            SiteResource::Index => "/wiki/index.json",
            SiteResource::Sitemap => "/wiki/sitemap.json",
            SiteResource::Articles => "/articles.json",
            SiteResource::Meta => "/meta.json",
        }
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            SiteResource::Index => "index",
            SiteResource::Sitemap => "sitemap",
            SiteResource::Articles => "articles",
            SiteResource::Meta => "meta",
        }
    }

    /// Parses a resource name, accepting a few aliases
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "index" | "wiki" => Some(SiteResource::Index),
            "sitemap" | "nav" | "navigation" => Some(SiteResource::Sitemap),
            "articles" | "notes" | "field-notes" => Some(SiteResource::Articles),
            "meta" | "metadata" => Some(SiteResource::Meta),
            _ => None,
        }
    }
}
