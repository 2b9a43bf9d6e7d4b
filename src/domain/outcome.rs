//! Per-item stage outcomes and their summaries.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pipeline stage an outcome belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Download,
    Transcription,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Transcription => write!(f, "transcription"),
        }
    }
}

/// Result of applying a stage to one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Newly produced artifact
    Success(PathBuf),

    /// Output already existed
    Skipped,

    /// Item-local failure, with reason
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome tagged with the item id it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub id: String,
    pub outcome: Outcome,
}

impl ItemOutcome {
    pub fn new(id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            id: id.into(),
            outcome,
        }
    }

    pub fn skipped(id: impl Into<String>) -> Self {
        Self::new(id, Outcome::Skipped)
    }

    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(id, Outcome::Failed(reason.into()))
    }
}

/// A failed item and its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Counts for one stage of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: StageKind,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl StageSummary {
    pub fn empty(stage: StageKind) -> Self {
        Self {
            stage,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn from_outcomes(stage: StageKind, outcomes: &[ItemOutcome]) -> Self {
        let mut summary = Self::empty(stage);
        for item in outcomes {
            match &item.outcome {
                Outcome::Success(_) => summary.succeeded += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed(reason) => {
                    summary.failed += 1;
                    summary.failures.push(ItemFailure {
                        id: item.id.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary.failures.sort_by(|a, b| a.id.cmp(&b.id));
        summary
    }

    /// Total candidates the stage considered
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} skipped, {} failed",
            self.stage, self.succeeded, self.skipped, self.failed
        )
    }
}
