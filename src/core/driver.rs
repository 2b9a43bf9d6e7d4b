//! Pipeline driver.
//!
//! Runs one pass over a collection:
//!
//! ```text
//! fetch feed → parse → download stage → list media → choose tier → transcription stage
//! ```
//!
//! The stages run strictly one after the other. Every decision about what to
//! skip is re-derived from the filesystem, so an interrupted run is resumed
//! simply by running again.

use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

use super::completion::{CompletionStore, FsCompletionStore};
use super::download::DownloadStage;
use super::probe::{ProbeError, ResourceProbe};
use super::progress::StageProgress;
use super::transcription::TranscriptionStage;
use crate::adapters::{MemoryProbe, TranscriberFactory};
use crate::config::PipelineConfig;
use crate::domain::{media_id, CollectionLayout, RunReport, RunStatus, StageKind, StageSummary};
use crate::ingest::{self, FeedError, FeedLocation, FeedSource};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Resources(#[from] ProbeError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Composes feed, stages and probe for one collection
pub struct PipelineDriver {
    layout: CollectionLayout,
    feed: FeedSource,
    store: Arc<dyn CompletionStore>,
    downloads: DownloadStage,
    transcriptions: TranscriptionStage,
    probe: ResourceProbe,
    show_progress: bool,
}

impl PipelineDriver {
    /// Build a driver from resolved configuration and the two external
    /// capabilities.
    pub fn new(
        config: &PipelineConfig,
        feed: FeedLocation,
        engines: Arc<dyn TranscriberFactory>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Result<Self, PipelineError> {
        let layout = config.layout();
        let store: Arc<dyn CompletionStore> = Arc::new(FsCompletionStore::new(layout.clone()));

        let feed = FeedSource::new(feed, config.feed_client()?);
        let downloads = DownloadStage::new(
            config.download_client()?,
            layout.clone(),
            store.clone(),
            config.concurrency,
        )
        .with_incomplete_policy(config.on_incomplete);
        let transcriptions =
            TranscriptionStage::new(engines, layout.clone(), store.clone(), config.concurrency);

        Ok(Self {
            layout,
            feed,
            store,
            downloads,
            transcriptions,
            probe: ResourceProbe::new(memory),
            show_progress: false,
        })
    }

    /// Show progress bars on the terminal
    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub fn layout(&self) -> &CollectionLayout {
        &self.layout
    }

    /// Run both stages once.
    ///
    /// Feed fetch failures and insufficient memory abort the run; item
    /// failures are collected in the report.
    #[instrument(skip(self), fields(collection = %self.layout.collection()))]
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new(self.layout.collection());
        self.layout.ensure_dirs().await?;

        let raw = self.feed.fetch().await?;
        if let Err(e) = fs::write(self.layout.feed_snapshot(), &raw).await {
            warn!(error = %e, "Failed to save feed snapshot");
        }

        let items = match ingest::parse(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Feed could not be parsed");
                Vec::new()
            }
        };
        report.items_found = items.len();

        if items.is_empty() {
            info!("No items found in feed, nothing to do");
            return Ok(report.finish(RunStatus::NothingToDo));
        }
        info!(items = items.len(), "Parsed feed");

        // Download
        let progress = self.progress(StageKind::Download, items.len());
        let outcomes = self.downloads.run(&items, &progress).await;
        report.downloads = StageSummary::from_outcomes(StageKind::Download, &outcomes);
        info!("{}", report.downloads);

        // Transcription only sees media present after every download finished
        let media = self.layout.list_media().await?;
        let pending = media
            .iter()
            .filter(|path| !self.store.is_transcribed(&media_id(path)))
            .count();

        let progress = self.progress(StageKind::Transcription, media.len());
        let outcomes = if pending == 0 {
            info!(files = media.len(), "All media already transcribed");
            self.transcriptions.skip_all(&media, &progress)
        } else {
            let tier = self.probe.choose_tier().await?;
            report.tier = Some(tier);
            self.transcriptions.run(&media, &tier, &progress).await
        };
        report.transcriptions = StageSummary::from_outcomes(StageKind::Transcription, &outcomes);
        info!("{}", report.transcriptions);

        Ok(report.finish(RunStatus::Completed))
    }

    fn progress(&self, stage: StageKind, total: usize) -> StageProgress {
        StageProgress::new(stage, total, self.show_progress)
    }
}
