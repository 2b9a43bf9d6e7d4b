//! Run report.
//!
//! A RunReport summarizes a single invocation of the pipeline. It is not
//! persisted; the next run re-derives everything from the filesystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::{StageKind, StageSummary};
use super::tier::TierSelection;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Both stages ran (individual items may still have failed)
    Completed,

    /// The feed produced no work items
    NothingToDo,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Collection name
    pub collection: String,

    /// How the run ended
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub finished_at: DateTime<Utc>,

    /// Work items parsed from the feed
    pub items_found: usize,

    /// Download stage counts
    pub downloads: StageSummary,

    /// Transcription stage counts
    pub transcriptions: StageSummary,

    /// Tier used for transcription (None when nothing needed transcribing)
    pub tier: Option<TierSelection>,
}

impl RunReport {
    /// Start a report for a run beginning now
    pub fn new(collection: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            status: RunStatus::NothingToDo,
            started_at: now,
            finished_at: now,
            items_found: 0,
            downloads: StageSummary::empty(StageKind::Download),
            transcriptions: StageSummary::empty(StageKind::Transcription),
            tier: None,
        }
    }

    /// Mark the run finished with the given status
    pub fn finish(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.finished_at = Utc::now();
        self
    }

    /// Number of items that failed in either stage
    pub fn failed_items(&self) -> usize {
        self.downloads.failed + self.transcriptions.failed
    }

    /// Number of artifacts newly produced by this run
    pub fn new_artifacts(&self) -> usize {
        self.downloads.succeeded + self.transcriptions.succeeded
    }
}
