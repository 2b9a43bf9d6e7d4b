//! Configuration for a pipeline run.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI on top of the loaded value)
//! 2. Environment variables (FEEDSCRIBE_ROOT, FEEDSCRIBE_CONCURRENCY, WHISPER_PATH)
//! 3. Config file (.feedscribe/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .feedscribe/config.yaml,
//!   then ~/.feedscribe/config.yaml
//! - `root` in the config file is relative to the directory containing
//!   .feedscribe/
//!
//! The resolved [`PipelineConfig`] is a plain value passed to each
//! component; there is no global configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::whisper::DEFAULT_WHISPER_PATH;
use crate::core::IncompletePolicy;
use crate::domain::CollectionLayout;

/// Browser-like agent; some feed hosts reject unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36";

const CONFIG_DIR: &str = ".feedscribe";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    pub root: Option<String>,
    pub concurrency: Option<usize>,
    pub media_extension: Option<String>,
    pub on_incomplete: Option<IncompletePolicy>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    pub user_agent: Option<String>,
    pub feed_timeout_seconds: Option<u64>,
    pub download_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhisperConfig {
    pub path: Option<String>,
}

/// Resolved configuration for one collection
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Directory holding the collection directories
    pub root: PathBuf,
    /// Collection name (directory prefix)
    pub collection: String,
    /// Workers per stage
    pub concurrency: usize,
    /// Media file extension, without the dot
    pub media_extension: String,
    /// Partial download handling
    pub on_incomplete: IncompletePolicy,
    pub user_agent: String,
    pub feed_timeout_seconds: u64,
    pub download_timeout_seconds: u64,
    /// Whisper binary
    pub whisper_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Defaults for a collection rooted in the current directory
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            root: PathBuf::from("."),
            collection: collection.into(),
            concurrency: 4,
            media_extension: "mp4".to_string(),
            on_incomplete: IncompletePolicy::Keep,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            feed_timeout_seconds: 60,
            download_timeout_seconds: 120,
            whisper_path: PathBuf::from(DEFAULT_WHISPER_PATH),
            config_file: None,
        }
    }

    pub fn layout(&self) -> CollectionLayout {
        CollectionLayout::new(&self.root, &self.collection, &self.media_extension)
    }

    /// HTTP client for fetching the feed document
    pub fn feed_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.feed_timeout_seconds))
            .build()
    }

    /// HTTP client for media downloads
    pub fn download_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.download_timeout_seconds))
            .build()
    }
}

/// Load configuration for `collection` from all sources
pub fn load(collection: &str) -> Result<PipelineConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config_file = find_config_file(&cwd).or_else(home_config_file);

    let file = match config_file {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve(collection, file, |key| std::env::var(key).ok())
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

fn home_config_file() -> Option<PathBuf> {
    let path = dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE);
    path.exists().then_some(path)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge file, environment and defaults
fn resolve<F>(
    collection: &str,
    file: Option<(PathBuf, ConfigFile)>,
    env: F,
) -> Result<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = PipelineConfig::new(collection);

    if let Some((path, file)) = file {
        // Base directory is the parent of .feedscribe/
        let base_dir = path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        if let Some(root) = file.root.as_deref() {
            config.root = resolve_path(base_dir, root);
        }
        if let Some(concurrency) = file.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ext) = file.media_extension {
            config.media_extension = ext.trim_start_matches('.').to_string();
        }
        if let Some(policy) = file.on_incomplete {
            config.on_incomplete = policy;
        }
        if let Some(agent) = file.http.user_agent {
            config.user_agent = agent;
        }
        if let Some(secs) = file.http.feed_timeout_seconds {
            config.feed_timeout_seconds = secs;
        }
        if let Some(secs) = file.http.download_timeout_seconds {
            config.download_timeout_seconds = secs;
        }
        if let Some(whisper) = file.whisper.path {
            config.whisper_path = PathBuf::from(whisper);
        }
        config.config_file = Some(path);
    }

    if let Some(root) = env("FEEDSCRIBE_ROOT") {
        config.root = PathBuf::from(root);
    }
    if let Some(value) = env("FEEDSCRIBE_CONCURRENCY") {
        config.concurrency = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid FEEDSCRIBE_CONCURRENCY: {}", value))?;
    }
    if let Some(whisper) = env("WHISPER_PATH") {
        config.whisper_path = PathBuf::from(whisper);
    }

    if config.concurrency == 0 {
        anyhow::bail!("Concurrency must be at least 1");
    }

    Ok(config)
}
