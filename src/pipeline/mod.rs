//! The hunting pipeline.
//!
//! - `Hunter`: orchestrates one crawl-filter-publish run end to end
//! - `FilterChain`: ordered predicates over offers, built fresh per run
//! - `ProcessorChain`: lazy transform and side-effect stages

mod filters;
mod hunter;
mod processors;

pub use filters::{FilterChain, FilterChainBuilder, OfferFilter};
pub use hunter::Hunter;
pub use processors::{Processor, ProcessorChain, ProcessorChainBuilder};
