//! Feed ingestion.
//!
//! Turns a feed location into the run's work list:
//!
//! ```text
//! feed URL / file → fetch → parse → Vec<WorkItem>
//! ```
//!
//! Work items are never persisted; they are re-derived from the feed on
//! every run.

pub mod feed;

// Re-export key types
pub use feed::{item_id, parse, FeedError, FeedLocation, FeedSource};
