//! Completion oracle for both stages.
//!
//! The filesystem is the source of truth: an item is transcribed when its
//! transcript exists, and downloaded when either its transcript or its media
//! file exists. A transcript alone is enough, so media that was cleaned up
//! after transcription is never fetched again.
//!
//! Pre-existing media of any size is trusted. Size verification happens only
//! while downloading.

use crate::domain::CollectionLayout;

/// Reports whether a stage's output for an item already exists
pub trait CompletionStore: Send + Sync {
    /// True if the download stage can skip this item
    fn is_downloaded(&self, id: &str) -> bool;

    /// True if the transcription stage can skip this item
    fn is_transcribed(&self, id: &str) -> bool;
}

/// Completion store backed by the collection directories
#[derive(Debug, Clone)]
pub struct FsCompletionStore {
    layout: CollectionLayout,
}

impl FsCompletionStore {
    pub fn new(layout: CollectionLayout) -> Self {
        Self { layout }
    }
}

impl CompletionStore for FsCompletionStore {
    fn is_downloaded(&self, id: &str) -> bool {
        self.is_transcribed(id) || self.layout.media_path(id).exists()
    }

    fn is_transcribed(&self, id: &str) -> bool {
        self.layout.transcript_path(id).exists()
    }
}
