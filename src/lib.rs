//! feedscribe - Resumable media feed download and transcription pipeline
//!
//! Reads an RSS feed of dated audio/video enclosures, downloads each item
//! once and transcribes each download once. Repeated invocations pick up
//! where the last one stopped.
//!
//! # Architecture
//!
//! The filesystem is the only state:
//! - Media lands in `<collection>_media/<id>.<ext>`
//! - Transcripts land in `<collection>_transcripts/<id>.txt`
//! - Whether a stage can skip an item is decided from those files alone
//!
//! # Modules
//!
//! - `adapters`: External capabilities (whisper, memory probes)
//! - `core`: Stages, completion checks, tier selection, driver
//! - `domain`: Data structures (WorkItem, Outcome, ResourceTier, RunReport)
//! - `ingest`: Feed fetching and parsing
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # First run stores the feed location
//! feedscribe run physics --feed https://example.com/lectures.xml
//!
//! # Later runs only fetch and transcribe what is new
//! feedscribe run physics
//!
//! # Inspect progress
//! feedscribe status physics
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use config::PipelineConfig;
pub use core::{
    CompletionStore, DownloadStage, FsCompletionStore, IncompletePolicy, PipelineDriver,
    PipelineError, ResourceProbe, TranscriptionStage,
};
pub use domain::{
    CollectionLayout, ItemOutcome, Outcome, ResourceTier, RunReport, RunStatus, TierSelection,
    WorkItem,
};
pub use ingest::{FeedError, FeedLocation, FeedSource};
