//! Command-line interface for feedscribe.
//!
//! Provides commands for running the pipeline over a collection, inspecting
//! what is already done, and checking which transcription tier this machine
//! would use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::{SystemMemoryProbe, WhisperCli};
use crate::config::{self, PipelineConfig};
use crate::core::{
    CompletionStore, FsCompletionStore, IncompletePolicy, PipelineDriver, PipelineError,
    ResourceProbe,
};
use crate::domain::{CollectionLayout, RunReport, RunStatus};
use crate::ingest::{FeedLocation, FeedSource};

/// feedscribe - download and transcribe every item of a media feed
#[derive(Parser, Debug)]
#[command(name = "feedscribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that work on a collection
#[derive(clap::Args, Debug, Clone)]
pub struct CollectionArgs {
    /// Collection name (prefix of the media and transcript directories)
    pub collection: String,

    /// Directory holding the collection directories
    #[arg(long, env = "FEEDSCRIBE_ROOT")]
    pub root: Option<PathBuf>,

    /// Feed URL or file; stored for later runs when given
    #[arg(short, long)]
    pub feed: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and transcribe everything not yet done
    Run {
        #[command(flatten)]
        target: CollectionArgs,

        /// Workers per stage
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// What to do with a download shorter than advertised
        #[arg(long, value_enum)]
        on_incomplete: Option<IncompletePolicy>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show download and transcript state of each feed item
    Status {
        #[command(flatten)]
        target: CollectionArgs,
    },

    /// Show which transcription tier this machine would use
    Probe,

    /// Show resolved configuration (debug)
    Config {
        /// Collection name
        #[arg(default_value = "default")]
        collection: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                target,
                concurrency,
                on_incomplete,
                json,
                quiet,
            } => run_collection(target, concurrency, on_incomplete, json, quiet).await,
            Commands::Status { target } => show_status(target).await,
            Commands::Probe => show_probe().await,
            Commands::Config { collection } => show_config(&collection),
        }
    }
}

/// Load config for a collection and apply CLI overrides
fn load_config(target: &CollectionArgs) -> Result<PipelineConfig> {
    let mut config = config::load(&target.collection)?;
    if let Some(root) = &target.root {
        config.root = root.clone();
    }
    Ok(config)
}

/// Resolve the feed location for a collection.
///
/// A location given on the command line is stored in the collection's feed
/// file; otherwise the stored one is used. Local paths are stored absolute.
pub fn resolve_feed_location(
    layout: &CollectionLayout,
    feed: Option<&str>,
) -> Result<FeedLocation> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve_feed_location_from(layout, feed, &cwd)
}

fn resolve_feed_location_from(
    layout: &CollectionLayout,
    feed: Option<&str>,
    cwd: &Path,
) -> Result<FeedLocation> {
    let path = layout.feed_location_file();

    if let Some(feed) = feed {
        let location = match FeedLocation::parse(feed) {
            FeedLocation::Local(local) => {
                let absolute = std::fs::canonicalize(cwd.join(&local))
                    .with_context(|| format!("Feed file not found: {}", local.display()))?;
                FeedLocation::Local(absolute)
            }
            remote => remote,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, location.to_string())
            .with_context(|| format!("Failed to store feed location in {}", path.display()))?;
        return Ok(location);
    }

    let stored = std::fs::read_to_string(&path).ok().unwrap_or_default();
    if stored.trim().is_empty() {
        anyhow::bail!(
            "No feed location stored for collection '{}'. Pass --feed <url|path>",
            layout.collection()
        );
    }

    Ok(FeedLocation::parse(&stored))
}

/// Run both stages for a collection
async fn run_collection(
    target: CollectionArgs,
    concurrency: Option<usize>,
    on_incomplete: Option<IncompletePolicy>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut config = load_config(&target)?;
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(policy) = on_incomplete {
        config.on_incomplete = policy;
    }

    let feed = resolve_feed_location(&config.layout(), target.feed.as_deref())?;
    info!(collection = %config.collection, %feed, "Starting run");

    let driver = PipelineDriver::new(
        &config,
        feed,
        Arc::new(WhisperCli::new(&config.whisper_path)),
        Arc::new(SystemMemoryProbe::new()),
    )?
    .with_progress(!quiet && !json);

    let report = match driver.run().await {
        Ok(report) => report,
        Err(e @ PipelineError::Feed(_)) | Err(e @ PipelineError::Resources(_)) => {
            eprintln!("\n[Run aborted: {}]", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    match report.status {
        RunStatus::NothingToDo => {
            println!("No items found in feed. Nothing to do.");
            return;
        }
        RunStatus::Completed => {}
    }

    println!("Collection: {}", report.collection);
    println!("Feed items: {}", report.items_found);
    if let Some(tier) = &report.tier {
        println!("Tier: {}", tier);
    }
    println!("{}", report.downloads);
    println!("{}", report.transcriptions);

    for failure in report
        .downloads
        .failures
        .iter()
        .chain(report.transcriptions.failures.iter())
    {
        println!("  failed {}: {}", failure.id, failure.reason);
    }

    if report.failed_items() == 0 {
        println!("\nAll items downloaded and transcribed.");
    } else {
        println!(
            "\n{} item(s) failed; run again to retry them.",
            report.failed_items()
        );
    }
}

/// Show per-item state for a collection
async fn show_status(target: CollectionArgs) -> Result<()> {
    let config = load_config(&target)?;
    let layout = config.layout();
    let feed = resolve_feed_location(&layout, target.feed.as_deref())?;

    let source = FeedSource::new(feed, config.feed_client()?);
    let items = source.load().await?;
    let store = FsCompletionStore::new(layout.clone());

    println!("Collection: {}", layout.collection());
    println!("Feed: {}", source.location());
    println!("Media: {}", layout.media_dir().display());
    println!("Transcripts: {}", layout.transcript_dir().display());
    println!();

    if items.is_empty() {
        println!("No items in feed.");
        return Ok(());
    }

    let mut transcribed = 0;
    for item in &items {
        let downloaded = store.is_downloaded(&item.id);
        let done = store.is_transcribed(&item.id);
        if done {
            transcribed += 1;
        }
        println!(
            "  {}  {:<10} {:<11}  {}",
            item.id,
            if downloaded { "downloaded" } else { "-" },
            if done { "transcribed" } else { "-" },
            item.source_url
        );
    }
    println!("\n{}/{} transcribed", transcribed, items.len());

    Ok(())
}

/// Show the tier the probe would choose
async fn show_probe() -> Result<()> {
    let probe = ResourceProbe::new(Arc::new(SystemMemoryProbe::new()));
    let selection = probe.choose_tier().await?;
    println!("Tier: {}", selection);
    Ok(())
}

/// Show resolved configuration
fn show_config(collection: &str) -> Result<()> {
    let config = config::load(collection)?;
    let layout = config.layout();

    println!("feedscribe configuration");
    println!("========================");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none found, using defaults)"),
    }
    println!();
    println!("{}", serde_yaml::to_string(&config)?);
    println!("Media dir: {}", layout.media_dir().display());
    println!("Transcript dir: {}", layout.transcript_dir().display());
    println!("Feed file: {}", layout.feed_location_file().display());

    Ok(())
}
