// src/models/mod.rs

//! Domain models for the hunting pipeline.

mod config;
mod offer;

// Re-export all public types
pub use config::{
    CrawlerConfig, FiltersConfig, HunterConfig, NotificationConfig, ProxyConfig, StorageConfig,
};
pub use offer::Offer;
