//! flathunt CLI
//!
//! Local execution entry point. Per-site crawler implementations plug in
//! through the `services::Crawler` trait at the library boundary; the
//! binary wires them into the hunter alongside storage and notification.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use flathunt::{
    error::Result,
    models::HunterConfig,
    pipeline::{FilterChain, Hunter},
    services::{Crawler, LogNotifier},
    storage::{LocalOfferStore, OfferStore},
};

/// flathunt - Real-Estate Offer Hunter
#[derive(Parser, Debug)]
#[command(
    name = "flathunt",
    version,
    about = "Watches listing sites for new real-estate offers"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the storage directory from the configuration
    #[arg(long)]
    data_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawl-filter-publish pipeline once
    Hunt {
        /// Limit each crawler to this many result pages
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Show stored offers that pass the configured filters
    Recent {
        /// Maximum number of offers to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Validate the configuration file
    Validate,
}

/// Registered per-site crawlers. Site support is added here.
fn registry() -> Vec<Arc<dyn Crawler>> {
    Vec::new()
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Validate = cli.command {
        let config = HunterConfig::load(&cli.config)?;
        config.validate()?;
        log::info!(
            "Configuration at {} is valid ({} URLs configured)",
            cli.config,
            config.urls().len()
        );
        return Ok(());
    }

    let config = Arc::new(HunterConfig::load_or_default(&cli.config));
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.storage.data_dir.clone());
    let store: Arc<dyn OfferStore> = Arc::new(LocalOfferStore::new(&data_dir));

    match cli.command {
        Command::Hunt { pages } => {
            let crawlers = registry();
            if crawlers.is_empty() {
                log::warn!("No crawlers registered, nothing will be fetched");
            }

            let pubsub = Arc::new(LogNotifier::new(config.notification.message.clone()));
            let hunter = Hunter::new(Arc::clone(&config), crawlers, store, pubsub)?;

            let offers = hunter.hunt_flats(pages).await?;
            log::info!("Hunt finished, {} new matching offers", offers.len());
        }

        Command::Recent { limit } => {
            let filters = FilterChain::builder()
                .read_config(&config.filters)
                .build();
            let filter = (!filters.is_empty()).then_some(&filters);
            let offers = store.recent_exposes(limit, filter).await?;

            if offers.is_empty() {
                log::info!("No stored offers match the configured filters");
            }
            for offer in &offers {
                println!("{}\t{}\t{}\t{}", offer.id, offer.price, offer.size, offer.url);
            }
        }

        // Handled before storage setup.
        Command::Validate => {}
    }

    Ok(())
}
