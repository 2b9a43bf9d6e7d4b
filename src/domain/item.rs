//! Work items and the on-disk layout of a collection.
//!
//! A collection is a named pair of directories under a root:
//!
//! ```text
//! <root>/<collection>_media/<id>.<ext>         downloaded media
//! <root>/<collection>_transcripts/<id>.txt     transcripts
//! <root>/<collection>_feed.txt                 feed location
//! ```
//!
//! All paths are derived from a work item's id, so the filesystem itself is
//! the record of what has been done.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

/// File name of the raw feed snapshot kept next to the media
pub const FEED_SNAPSHOT_NAME: &str = "rss_feed.xml";

/// One media item from the feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Publish date (YYYY-MM-DD), used as the file stem
    pub id: String,

    /// Enclosure URL
    pub source_url: String,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
        }
    }
}

/// Output locations for a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub media: PathBuf,
    pub transcript: PathBuf,
}

/// Directory layout for one collection
#[derive(Debug, Clone)]
pub struct CollectionLayout {
    root: PathBuf,
    collection: String,
    media_dir: PathBuf,
    transcript_dir: PathBuf,
    media_extension: String,
}

impl CollectionLayout {
    /// Create a layout rooted at `root`.
    ///
    /// `media_extension` is given without the leading dot (e.g. `mp4`).
    pub fn new(root: impl Into<PathBuf>, collection: &str, media_extension: &str) -> Self {
        let root = root.into();
        Self {
            media_dir: root.join(format!("{}_media", collection)),
            transcript_dir: root.join(format!("{}_transcripts", collection)),
            root,
            collection: collection.to_string(),
            media_extension: media_extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn transcript_dir(&self) -> &Path {
        &self.transcript_dir
    }

    pub fn media_extension(&self) -> &str {
        &self.media_extension
    }

    /// File holding the feed location for this collection
    pub fn feed_location_file(&self) -> PathBuf {
        self.root.join(format!("{}_feed.txt", self.collection))
    }

    /// Snapshot of the last fetched feed document
    pub fn feed_snapshot(&self) -> PathBuf {
        self.media_dir.join(FEED_SNAPSHOT_NAME)
    }

    pub fn media_path(&self, id: &str) -> PathBuf {
        self.media_dir.join(format!("{}.{}", id, self.media_extension))
    }

    pub fn transcript_path(&self, id: &str) -> PathBuf {
        self.transcript_dir.join(format!("{}.txt", id))
    }

    pub fn paths(&self, item: &WorkItem) -> ArtifactPaths {
        ArtifactPaths {
            media: self.media_path(&item.id),
            transcript: self.transcript_path(&item.id),
        }
    }

    /// Create the media and transcript directories if missing
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.media_dir).await?;
        fs::create_dir_all(&self.transcript_dir).await?;
        Ok(())
    }

    /// List media files present in the media directory, sorted by name.
    ///
    /// Only files carrying the configured extension are returned; the feed
    /// snapshot and any stray files are ignored. A missing directory yields
    /// an empty list.
    pub async fn list_media(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.media_dir.exists() {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy() == self.media_extension)
                .unwrap_or(false);
            if matches {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Item id for a media file (its file stem)
pub fn media_id(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
