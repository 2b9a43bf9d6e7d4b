//! Download stage.
//!
//! Streams each pending item's enclosure to its media path with a bounded
//! number of concurrent transfers. After the body ends, the byte count is
//! compared with the advertised Content-Length; a server that omits it is
//! treated as advertising 0, so the check passes. Failures are recorded per
//! item and never stop the stage. There are no retries except the opt-in
//! `retry-once` incomplete policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::completion::CompletionStore;
use super::progress::StageProgress;
use crate::domain::{CollectionLayout, ItemOutcome, Outcome, WorkItem};

/// Errors for a single item's download
#[derive(Debug, Error)]
pub enum DownloadItemError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("incomplete ({written} of {expected} bytes)")]
    Incomplete { written: u64, expected: u64 },
}

/// What to do with a partial file after a size mismatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IncompletePolicy {
    /// Leave the partial file in place
    #[default]
    Keep,

    /// Remove the partial file
    Delete,

    /// Download once more, then keep whatever arrived
    RetryOnce,
}

/// Bounded-concurrency downloader
#[derive(Clone)]
pub struct DownloadStage {
    client: reqwest::Client,
    layout: CollectionLayout,
    store: Arc<dyn CompletionStore>,
    concurrency: usize,
    on_incomplete: IncompletePolicy,
}

impl DownloadStage {
    /// Create a download stage.
    ///
    /// The client should carry the per-request timeout.
    pub fn new(
        client: reqwest::Client,
        layout: CollectionLayout,
        store: Arc<dyn CompletionStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            layout,
            store,
            concurrency: concurrency.max(1),
            on_incomplete: IncompletePolicy::default(),
        }
    }

    pub fn with_incomplete_policy(mut self, policy: IncompletePolicy) -> Self {
        self.on_incomplete = policy;
        self
    }

    /// Download every item not already satisfied.
    ///
    /// Returns one outcome per item, in completion order.
    #[instrument(skip_all, fields(items = items.len(), concurrency = self.concurrency))]
    pub async fn run(&self, items: &[WorkItem], progress: &StageProgress) -> Vec<ItemOutcome> {
        let limit = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for item in items.iter().cloned() {
            let stage = self.clone();
            let limit = limit.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = limit.acquire_owned().await.ok();
                stage.download_item(&item).await
            });
        }

        // Ids without an outcome yet; whatever remains belongs to aborted tasks
        let mut unfinished: HashMap<&str, usize> = HashMap::new();
        for item in items {
            *unfinished.entry(item.id.as_str()).or_default() += 1;
        }

        let mut outcomes = Vec::with_capacity(items.len());
        let mut aborted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Some(count) = unfinished.get_mut(outcome.id.as_str()) {
                        *count = count.saturating_sub(1);
                    }
                    progress.record(&outcome);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(error = %e, "Download task aborted");
                    aborted.push(e.to_string());
                }
            }
        }

        if !aborted.is_empty() {
            let reason = format!("task aborted: {}", aborted.join("; "));
            for item in items {
                let Some(count) = unfinished.get_mut(item.id.as_str()) else {
                    continue;
                };
                if *count > 0 {
                    *count -= 1;
                    let outcome = ItemOutcome::failed(&item.id, reason.clone());
                    progress.record(&outcome);
                    outcomes.push(outcome);
                }
            }
        }
        progress.finish();

        outcomes
    }

    /// Download one item, applying the skip check and incomplete policy
    async fn download_item(&self, item: &WorkItem) -> ItemOutcome {
        if self.store.is_downloaded(&item.id) {
            debug!(id = %item.id, "Already downloaded, skipping");
            return ItemOutcome::skipped(&item.id);
        }

        let path = self.layout.media_path(&item.id);
        let mut result = fetch_to_file(&self.client, &item.source_url, &path).await;

        if let Err(DownloadItemError::Incomplete { written, expected }) = &result {
            warn!(
                id = %item.id,
                written,
                expected,
                policy = ?self.on_incomplete,
                "Download incomplete"
            );
            match self.on_incomplete {
                IncompletePolicy::Keep => {}
                IncompletePolicy::Delete => {
                    if let Err(e) = fs::remove_file(&path).await {
                        warn!(id = %item.id, error = %e, "Failed to remove partial download");
                    }
                }
                IncompletePolicy::RetryOnce => {
                    info!(id = %item.id, "Retrying incomplete download");
                    result = fetch_to_file(&self.client, &item.source_url, &path).await;
                }
            }
        }

        match result {
            Ok(bytes) => {
                info!(id = %item.id, bytes, "Downloaded");
                ItemOutcome::new(&item.id, Outcome::Success(path))
            }
            Err(e) => {
                warn!(id = %item.id, url = %item.source_url, error = %e, "Download failed");
                ItemOutcome::failed(&item.id, e.to_string())
            }
        }
    }
}

/// Stream `url` into `path` and verify the byte count.
///
/// Returns the number of bytes written. The file is left in place on any
/// error after it was created.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<u64, DownloadItemError> {
    let mut response = client.get(url).send().await?.error_for_status()?;
    let expected = response.content_length().unwrap_or(0);

    let mut file = File::create(path).await?;
    let mut written = 0u64;
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            // A body cut short of its advertised length is a size mismatch
            Err(e) if written < expected => {
                debug!(url, error = %e, "Body ended early");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    verify_size(written, expected)?;
    Ok(written)
}

/// Fail when fewer bytes arrived than were advertised
pub fn verify_size(written: u64, expected: u64) -> Result<(), DownloadItemError> {
    if written < expected {
        return Err(DownloadItemError::Incomplete { written, expected });
    }
    Ok(())
}
