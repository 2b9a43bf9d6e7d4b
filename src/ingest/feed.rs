//! Feed fetching and parsing.
//!
//! A feed is an RSS document whose items carry an `<enclosure url=…>` and a
//! `<pubDate>`. Each usable item becomes a [`WorkItem`] keyed by the date
//! portion of its publish timestamp.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::WorkItem;

/// Errors that can occur while obtaining the work list
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to fetch feed from {location}: {reason}")]
    Fetch { location: String, reason: String },

    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

/// Where the feed document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    /// http(s) URL
    Remote(String),

    /// Local file (offline re-runs)
    Local(PathBuf),
}

impl FeedLocation {
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Remote(trimmed.to_string())
        } else {
            Self::Local(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for FeedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetches the feed document and turns it into work items
#[derive(Debug, Clone)]
pub struct FeedSource {
    location: FeedLocation,
    client: reqwest::Client,
}

impl FeedSource {
    /// Create a feed source.
    ///
    /// The client should carry the feed timeout and user agent.
    pub fn new(location: FeedLocation, client: reqwest::Client) -> Self {
        Self { location, client }
    }

    pub fn location(&self) -> &FeedLocation {
        &self.location
    }

    /// Fetch the raw feed document
    #[instrument(skip(self), fields(location = %self.location))]
    pub async fn fetch(&self) -> Result<Vec<u8>, FeedError> {
        let fetch_error = |reason: String| FeedError::Fetch {
            location: self.location.to_string(),
            reason,
        };

        let raw = match &self.location {
            FeedLocation::Remote(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| fetch_error(e.to_string()))?;

                response
                    .bytes()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?
                    .to_vec()
            }
            FeedLocation::Local(path) => fs::read(path)
                .await
                .map_err(|e| fetch_error(e.to_string()))?,
        };

        info!(bytes = raw.len(), "Fetched feed");
        Ok(raw)
    }

    /// Fetch and parse in one go
    pub async fn load(&self) -> Result<Vec<WorkItem>, FeedError> {
        let raw = self.fetch().await?;
        parse(&raw)
    }
}

/// Parse a feed document into work items.
///
/// Items lacking an enclosure URL or a publish date are skipped. When two
/// items share an id, the later one wins but keeps the earlier position.
pub fn parse(raw: &[u8]) -> Result<Vec<WorkItem>, FeedError> {
    let channel = rss::Channel::read_from(raw).map_err(|e| FeedError::Parse(e.to_string()))?;

    let mut items: Vec<WorkItem> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in channel.items() {
        let url = entry
            .enclosure()
            .map(|enclosure| enclosure.url().trim())
            .filter(|url| !url.is_empty());
        let id = entry.pub_date().and_then(item_id);

        let (Some(url), Some(id)) = (url, id) else {
            debug!(title = ?entry.title(), "Skipping feed entry without enclosure or date");
            continue;
        };

        let item = WorkItem::new(id, url);
        match positions.get(&item.id) {
            Some(&pos) => {
                debug!(id = %item.id, "Duplicate feed entry, keeping the later one");
                items[pos] = item;
            }
            None => {
                positions.insert(item.id.clone(), items.len());
                items.push(item);
            }
        }
    }

    Ok(items)
}

/// Derive an item id from a publish timestamp.
///
/// ISO-8601 text (starting with a digit) keeps everything before the `T`.
/// RFC 2822 dates (the RSS norm) are reduced to their calendar date; when the
/// strict parser rejects them (named zones, unpadded hours, no time), only
/// the leading `[Day,] DD Mon YYYY` part is read.
pub fn item_id(pub_date: &str) -> Option<String> {
    let text = pub_date.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.date_naive().to_string());
    }
    if let Some(date) = leading_rfc2822_date(text) {
        return Some(date.to_string());
    }
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let date = text.split('T').next().unwrap_or(text).trim();
    if date.is_empty() {
        return None;
    }

    // Ids are file stems
    Some(date.replace(['/', '\\'], "-"))
}

/// Calendar date from the start of an RFC 2822 timestamp, ignoring the rest
fn leading_rfc2822_date(text: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    if tokens.len() >= 4 {
        let with_weekday = tokens[..4].join(" ");
        if let Ok(date) = NaiveDate::parse_from_str(&with_weekday, "%a, %d %b %Y") {
            return Some(date);
        }
    }
    if tokens.len() >= 3 {
        let without_weekday = tokens[..3].join(" ");
        if let Ok(date) = NaiveDate::parse_from_str(&without_weekday, "%d %b %Y") {
            return Some(date);
        }
    }

    None
}
