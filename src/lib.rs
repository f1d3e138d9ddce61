// src/lib.rs

//! flathunt library
//!
//! Watches real-estate listing sites for new offers, deduplicates and
//! filters them, and forwards matches to notifiers.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
