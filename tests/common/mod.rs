//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use feedscribe::adapters::{MemoryProbe, Transcriber, TranscriberFactory};
use feedscribe::domain::{media_id, TierSelection, GIB};
use feedscribe::PipelineConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Engine that "transcribes" by echoing the file stem; stems listed in
/// `fail_ids` fail.
pub struct StubEngine {
    fail_ids: Vec<String>,
}

impl Transcriber for StubEngine {
    fn transcribe(&mut self, media: &Path) -> anyhow::Result<String> {
        let id = media_id(media);
        if self.fail_ids.contains(&id) {
            anyhow::bail!("cannot decode {}", id);
        }
        let bytes = std::fs::read(media)?;
        Ok(format!("{}: {} bytes", id, bytes.len()))
    }
}

#[derive(Default)]
pub struct StubEngines {
    pub fail_ids: Vec<String>,
    pub initialized: AtomicUsize,
}

impl StubEngines {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            initialized: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl TranscriberFactory for StubEngines {
    fn name(&self) -> &str {
        "stub"
    }

    fn initialize(&self, _selection: &TierSelection) -> anyhow::Result<Box<dyn Transcriber>> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubEngine {
            fail_ids: self.fail_ids.clone(),
        }))
    }
}

/// Memory probe returning fixed values
pub struct FixedMemory {
    pub accelerator: Option<u64>,
    pub general: u64,
}

impl FixedMemory {
    pub fn cpu_gib(gib: u64) -> Self {
        Self {
            accelerator: None,
            general: gib * GIB,
        }
    }

    pub fn accelerator_gib(gib: u64, general_gib: u64) -> Self {
        Self {
            accelerator: Some(gib * GIB),
            general: general_gib * GIB,
        }
    }
}

#[async_trait]
impl MemoryProbe for FixedMemory {
    async fn accelerator_memory(&self) -> Option<u64> {
        self.accelerator
    }

    async fn general_memory(&self) -> u64 {
        self.general
    }
}

/// Config rooted in a temp directory
pub fn test_config(root: &Path, concurrency: usize) -> PipelineConfig {
    let mut config = PipelineConfig::new("lectures");
    config.root = root.to_path_buf();
    config.concurrency = concurrency;
    config
}

/// RSS document with one item per (pubDate, url)
pub fn rss_feed(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(date, url)| {
            format!(
                r#"<item><title>Lecture {date}</title><enclosure url="{url}" length="0" type="video/mp4"/><pubDate>{date}</pubDate></item>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Lectures</title><link>https://example.com</link><description>Recorded lectures</description>{}</channel></rss>"#,
        items
    )
}

/// Write a feed document into `dir` and return its path
pub fn write_feed(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("feed.xml");
    std::fs::write(&path, rss_feed(entries)).unwrap();
    path
}

/// Every file under `root` with its contents
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// HTTP server that advertises `advertised` bytes but sends only `body`,
/// then closes the connection. Returns the base URL and a request counter.
pub async fn truncating_server(
    advertised: usize,
    body: &'static [u8],
) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    advertised
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}
