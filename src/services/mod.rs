//! Service layer for the hunting pipeline.
//!
//! This module contains the boundaries the pipeline is wired against:
//! - Resilient page fetching (`ResilientFetcher`)
//! - Per-site crawlers (`Crawler`)
//! - Proxy candidate sourcing (`ProxyProvider`)
//! - Notification fan-out (`Pubsub`)

mod crawler;
mod fetcher;
mod proxies;
mod pubsub;

pub use crawler::Crawler;
pub use fetcher::{ChallengeKind, ChallengeSolver, FetchedPage, HeaderRotator, ResilientFetcher};
pub use proxies::{FreeProxyListProvider, ProxyProvider, StaticProxyProvider};
pub use pubsub::{LogNotifier, NopPubsub, Pubsub};
