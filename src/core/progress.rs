//! Per-stage progress reporting.
//!
//! Every candidate advances the bar exactly once, whether it was skipped,
//! processed or failed, so the final position equals the candidate count.
//! Only the stage's collector loop touches the bar.

use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::{ItemOutcome, Outcome, StageKind};

/// Progress bar for one stage
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    /// Create a progress bar for `total` candidates
    pub fn new(stage: StageKind, total: usize, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{prefix:>13} [{bar:30}] {pos}/{len} ({elapsed}) {msg}",
            ) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(total as u64);
        bar.set_prefix(stage.to_string());
        Self { bar }
    }

    /// Hidden bar (tests, quiet mode)
    pub fn hidden(stage: StageKind, total: usize) -> Self {
        Self::new(stage, total, false)
    }

    /// Record one finished candidate
    pub fn record(&self, outcome: &ItemOutcome) {
        if let Outcome::Failed(reason) = &outcome.outcome {
            self.bar.set_message(format!("{} failed: {}", outcome.id, reason));
        }
        self.bar.inc(1);
    }

    /// Number of candidates recorded so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}
