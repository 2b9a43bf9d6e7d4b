//! Adapter interfaces for external systems.
//!
//! The pipeline treats the transcription engine and the memory probes as
//! opaque capabilities. Each has a trait here and one default
//! implementation that talks to the host system.

pub mod memory;
pub mod whisper;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::TierSelection;

pub use memory::SystemMemoryProbe;
pub use whisper::{WhisperCli, WhisperEngine};

/// Loaded transcription engine.
///
/// Calls are blocking; the pipeline runs them on the blocking thread pool.
/// An engine is owned by a single worker, so implementations need not be
/// safe for concurrent use.
pub trait Transcriber: Send {
    /// Transcribe one media file to text
    fn transcribe(&mut self, media: &Path) -> Result<String>;
}

/// Creates transcription engines for a tier.
///
/// Initialization may be expensive (model loading) and is done once per
/// worker.
pub trait TranscriberFactory: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Load an engine sized for `selection`
    fn initialize(&self, selection: &TierSelection) -> Result<Box<dyn Transcriber>>;
}

/// Memory queries used to size the transcription workload
#[async_trait]
pub trait MemoryProbe: Send + Sync {
    /// Free accelerator memory in bytes, or None without a usable accelerator
    async fn accelerator_memory(&self) -> Option<u64>;

    /// Available system memory in bytes
    async fn general_memory(&self) -> u64;
}
