//! Domain types for the feed pipeline.
//!
//! This module contains the core data structures:
//! - WorkItem / CollectionLayout: what to fetch and where it lands
//! - Outcome: per-item stage results and summaries
//! - ResourceTier: transcription model sizes
//! - RunReport: the result of one pipeline run

pub mod item;
pub mod outcome;
pub mod run;
pub mod tier;

// Re-export commonly used types
pub use item::{media_id, ArtifactPaths, CollectionLayout, WorkItem};
pub use outcome::{ItemFailure, ItemOutcome, Outcome, StageKind, StageSummary};
pub use run::{RunReport, RunStatus};
pub use tier::{Device, ResourceTier, TierSelection, GIB};
