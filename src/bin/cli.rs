//! chanfeed CLI
//!
//! Local execution entry point. For AWS Lambda, use `chanfeed-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use chanfeed::{
    config::load_config,
    error::{AppError, Result},
    pipeline::Crawler,
    storage::{FeedStore, LocalStorage},
};
use clap::{Parser, Subcommand};

/// chanfeed - merged feed of public channels
#[derive(Parser, Debug)]
#[command(
    name = "chanfeed",
    version,
    about = "Incremental channel crawler publishing one merged RSS feed"
)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Storage directory for the feed and watermarks (overrides storage.root)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl all sources and publish new items
    Crawl,

    /// Print the last published feed
    Feed,

    /// Print the stored watermarks
    State,

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    let storage = match &cli.storage_dir {
        Some(dir) => LocalStorage::with_keys(dir, &config.storage),
        None => LocalStorage::from_config(&config.storage),
    };

    match cli.command {
        Command::Crawl => {
            config.validate()?;
            let crawler = Crawler::from_config(Arc::new(config), Arc::new(storage))?;
            let report = crawler.run_crawl().await?;

            for failure in &report.failures {
                log::warn!("✗ {}: {}", failure.source_id, failure.error);
            }
            log::info!(
                "Crawled {} source(s) in {}ms: {} new item(s), {} failed, feed {}",
                report.sources_total,
                report.duration_ms(),
                report.items_emitted,
                report.failures.len(),
                if report.committed { "published" } else { "unchanged" }
            );
        }

        Command::Feed => {
            let feed = storage.load_feed().await?.ok_or_else(|| {
                AppError::storage(format!(
                    "No feed published yet under {}",
                    storage.root_dir().display()
                ))
            })?;
            println!("{feed}");
        }

        Command::State => {
            let watermarks = storage.load_watermarks().await?;
            if watermarks.is_empty() {
                log::info!("No watermarks stored yet.");
            }
            println!("{}", serde_json::to_string_pretty(&watermarks)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} source(s))", config.source_ids().len());
        }
    }

    Ok(())
}
