//! Transcription stage.
//!
//! A fixed pool of workers drains a shared queue of media files. Each worker
//! owns one engine, created lazily the first time it meets a file that still
//! needs a transcript and reused for every later file; engines are never
//! shared between workers. Engine calls are blocking and run on the blocking
//! thread pool.
//!
//! Transcripts are written to a `.part` file and renamed into place, so a
//! failed item never leaves a transcript behind.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::completion::CompletionStore;
use super::progress::StageProgress;
use crate::adapters::{Transcriber, TranscriberFactory};
use crate::domain::{media_id, CollectionLayout, ItemOutcome, Outcome, TierSelection};

/// Errors for a single item's transcription
#[derive(Debug, Error)]
pub enum TranscriptionItemError {
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    #[error("transcription failed: {0}")]
    Transcribe(String),

    #[error("writing transcript failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("worker aborted: {0}")]
    Aborted(String),
}

/// A worker's engine
enum EngineSlot {
    /// Not created yet (or lost to a panic)
    Pending,
    Ready(Box<dyn Transcriber>),
    /// Initialization failed; every later file fails with this reason
    Failed(String),
}

type MediaQueue = Arc<Mutex<VecDeque<PathBuf>>>;

/// Bounded-concurrency transcriber
#[derive(Clone)]
pub struct TranscriptionStage {
    factory: Arc<dyn TranscriberFactory>,
    layout: CollectionLayout,
    store: Arc<dyn CompletionStore>,
    concurrency: usize,
}

impl TranscriptionStage {
    pub fn new(
        factory: Arc<dyn TranscriberFactory>,
        layout: CollectionLayout,
        store: Arc<dyn CompletionStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            factory,
            layout,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Transcribe every media file lacking a transcript.
    ///
    /// Returns one outcome per file, in completion order.
    #[instrument(
        skip_all,
        fields(files = media.len(), tier = %tier.tier, engine = self.factory.name())
    )]
    pub async fn run(
        &self,
        media: &[PathBuf],
        tier: &TierSelection,
        progress: &StageProgress,
    ) -> Vec<ItemOutcome> {
        let queue: MediaQueue = Arc::new(Mutex::new(media.iter().cloned().collect()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = self.concurrency.min(media.len());
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let stage = self.clone();
            let queue = queue.clone();
            let tx = tx.clone();
            let tier = *tier;
            pool.spawn(async move { stage.worker_loop(worker, queue, tier, tx).await });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(media.len());
        while let Some(outcome) = rx.recv().await {
            progress.record(&outcome);
            outcomes.push(outcome);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Transcription worker aborted");
            }
        }
        progress.finish();

        outcomes
    }

    /// Report every file as skipped without touching an engine.
    ///
    /// Used when nothing needs transcribing, so no tier has to be chosen.
    pub fn skip_all(&self, media: &[PathBuf], progress: &StageProgress) -> Vec<ItemOutcome> {
        let outcomes: Vec<ItemOutcome> = media
            .iter()
            .map(|path| ItemOutcome::skipped(media_id(path)))
            .collect();
        for outcome in &outcomes {
            progress.record(outcome);
        }
        progress.finish();
        outcomes
    }

    async fn worker_loop(
        self,
        worker: usize,
        queue: MediaQueue,
        tier: TierSelection,
        tx: mpsc::UnboundedSender<ItemOutcome>,
    ) {
        let mut engine = EngineSlot::Pending;

        loop {
            let next = queue.lock().ok().and_then(|mut q| q.pop_front());
            let Some(media) = next else {
                break;
            };

            let outcome = self.transcribe_file(&media, &tier, &mut engine).await;
            if tx.send(outcome).is_err() {
                break;
            }
        }

        debug!(worker, "Transcription worker finished");
    }

    async fn transcribe_file(
        &self,
        media: &Path,
        tier: &TierSelection,
        engine: &mut EngineSlot,
    ) -> ItemOutcome {
        let id = media_id(media);

        if self.store.is_transcribed(&id) {
            debug!(%id, "Already transcribed, skipping");
            return ItemOutcome::skipped(id);
        }

        let transcript_path = self.layout.transcript_path(&id);
        match self
            .transcribe_and_write(media, &transcript_path, tier, engine)
            .await
        {
            Ok(()) => {
                info!(%id, "Transcribed");
                ItemOutcome::new(id, Outcome::Success(transcript_path))
            }
            Err(e) => {
                warn!(%id, error = %e, "Transcription failed");
                ItemOutcome::failed(id, e.to_string())
            }
        }
    }

    async fn transcribe_and_write(
        &self,
        media: &Path,
        transcript_path: &Path,
        tier: &TierSelection,
        slot: &mut EngineSlot,
    ) -> Result<(), TranscriptionItemError> {
        let mut current = match std::mem::replace(slot, EngineSlot::Pending) {
            EngineSlot::Ready(engine) => engine,
            EngineSlot::Failed(reason) => {
                *slot = EngineSlot::Failed(reason.clone());
                return Err(TranscriptionItemError::EngineInit(reason));
            }
            EngineSlot::Pending => match self.initialize_engine(tier).await {
                Ok(engine) => engine,
                Err(reason) => {
                    *slot = EngineSlot::Failed(reason.clone());
                    return Err(TranscriptionItemError::EngineInit(reason));
                }
            },
        };

        let path = media.to_path_buf();
        // A panic inside the engine loses it; the slot stays Pending
        let (engine, result) = tokio::task::spawn_blocking(move || {
            let result = current.transcribe(&path);
            (current, result)
        })
        .await
        .map_err(|e| TranscriptionItemError::Aborted(e.to_string()))?;
        *slot = EngineSlot::Ready(engine);

        let text = result.map_err(|e| TranscriptionItemError::Transcribe(format!("{:#}", e)))?;
        write_transcript(transcript_path, &text).await?;
        Ok(())
    }

    async fn initialize_engine(
        &self,
        tier: &TierSelection,
    ) -> Result<Box<dyn Transcriber>, String> {
        let factory = self.factory.clone();
        let tier = *tier;
        info!(tier = %tier.tier, device = %tier.device, "Loading transcription engine");

        match tokio::task::spawn_blocking(move || factory.initialize(&tier)).await {
            Ok(Ok(engine)) => Ok(engine),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Write a transcript atomically (temp file, then rename)
async fn write_transcript(path: &Path, text: &str) -> std::io::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = async {
        fs::write(&part, text.as_bytes()).await?;
        fs::rename(&part, path).await
    }
    .await;

    if written.is_err() {
        let _ = fs::remove_file(&part).await;
    }
    written
}
