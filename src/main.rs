// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! TagWatch - Live RFID Tag Tracking
//!
//! Headless tracker: polls the reader backend, keeps the live tag table and
//! logs every change. With `--once` it takes a single snapshot and prints it
//! as JSON.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tagwatch::core::UpdatePayload;
use tagwatch::{Config, PollTarget, QueryFilter, TrackingEngine, NAME, VERSION};

/// TagWatch - Live RFID Tag Tracking
#[derive(Parser, Debug)]
#[command(name = "tagwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Live RFID tag tracking and reader health monitoring")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated reader fleet
    #[arg(long)]
    demo: bool,

    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Take one snapshot, print it as JSON and exit
    #[arg(long)]
    once: bool,

    /// Free-text search applied to the printed entities
    #[arg(long)]
    search: Option<String>,

    /// Only show entities last seen by this reader
    #[arg(long)]
    reader: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration; logging is not up yet
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(base_url) = &args.base_url {
        config.source.base_url = base_url.clone();
    }
    config.validate()?;

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.tracing_level()?
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(!args.once)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let mut filter = QueryFilter::search(args.search.clone().unwrap_or_default());
    if let Some(reader) = &args.reader {
        filter = filter.with_reader(reader.clone());
    }

    let rt = tokio::runtime::Runtime::new()?;
    if args.once {
        rt.block_on(run_once(config, filter))
    } else {
        rt.block_on(run_headless(config, filter))
    }
}

/// Single snapshot printed to stdout
async fn run_once(config: Config, filter: QueryFilter) -> Result<()> {
    let engine = TrackingEngine::from_config(config)?;

    engine.refresh_tags().await?;
    if let Err(err) = engine.refresh_readers().await {
        warn!("Reader status unavailable: {}", err);
    }

    let output = serde_json::json!({
        "counts": engine.status_counts(),
        "health": engine.get_reader_health(),
        "readers": &*engine.get_readers(),
        "tags": engine.search(&filter),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Poll until Ctrl+C
async fn run_headless(config: Config, filter: QueryFilter) -> Result<()> {
    let engine = Arc::new(TrackingEngine::from_config(config)?);

    let watcher = Arc::downgrade(&engine);
    engine.on_update(move |event| match &event.payload {
        UpdatePayload::Tags { inserted, updated, rejected, total_entities, .. } => {
            info!(
                "Poll #{}: {} tags ({} new, {} updated, {} rejected)",
                event.sequence, total_entities, inserted, updated, rejected
            );
            if let Some(engine) = watcher.upgrade() {
                let counts = engine.status_counts();
                let matching = if filter.is_unconstrained() {
                    counts.total
                } else {
                    engine.search(&filter).len()
                };
                info!(
                    "  {} active, {} idle, {} missing; {} matching filter",
                    counts.active, counts.idle, counts.missing, matching
                );
            }
        }
        UpdatePayload::Readers { online, total } => {
            info!("Readers: {}/{} online", online, total);
        }
    });

    let tags = engine.start_polling(PollTarget::LiveTags);
    let readers = engine.start_polling(PollTarget::ReaderStatus);

    info!("{} running", NAME);
    info!("   Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, stopping pollers...");
    tags.stop().await;
    readers.stop().await;

    let state = engine.state();
    info!(
        "{} shutdown complete after {}s ({} entities tracked)",
        NAME, state.uptime_seconds, state.tracked_entities
    );
    Ok(())
}
