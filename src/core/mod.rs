//! Core pipeline logic.
//!
//! This module contains:
//! - CompletionStore: filesystem-backed skip decisions
//! - ResourceProbe: transcription tier selection
//! - DownloadStage / TranscriptionStage: bounded worker pools
//! - PipelineDriver: composes the above into one run

pub mod completion;
pub mod download;
pub mod driver;
pub mod probe;
pub mod progress;
pub mod transcription;

// Re-export commonly used types
pub use completion::{CompletionStore, FsCompletionStore};
pub use download::{fetch_to_file, verify_size, DownloadItemError, DownloadStage, IncompletePolicy};
pub use driver::{PipelineDriver, PipelineError};
pub use probe::{select_tier, ProbeError, ResourceProbe};
pub use progress::StageProgress;
pub use transcription::{TranscriptionItemError, TranscriptionStage};
