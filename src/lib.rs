//! FogSift site client library
//!
//! Exposes the cache, the site data client and the CLI plumbing so the
//! binary and the integration tests share one implementation.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
