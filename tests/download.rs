//! Download Stage Integration Tests
//!
//! Exercises the download stage against a mock HTTP server: skipping,
//! transport failures, size verification and bounded concurrency.

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::truncating_server;
use feedscribe::core::{DownloadStage, FsCompletionStore, IncompletePolicy, StageProgress};
use feedscribe::domain::{CollectionLayout, Outcome, StageKind, WorkItem};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

async fn stage(temp: &TempDir, concurrency: usize) -> (DownloadStage, CollectionLayout) {
    let layout = CollectionLayout::new(temp.path(), "lectures", "mp4");
    layout.ensure_dirs().await.unwrap();
    let store = Arc::new(FsCompletionStore::new(layout.clone()));
    let stage = DownloadStage::new(reqwest::Client::new(), layout.clone(), store, concurrency);
    (stage, layout)
}

fn progress(total: usize) -> StageProgress {
    StageProgress::hidden(StageKind::Download, total)
}

#[tokio::test]
async fn test_download_writes_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/one.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"lecture one".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 2).await;
    let items = vec![WorkItem::new(
        "2024-01-01",
        format!("{}/media/one.mp4", server.uri()),
    )];

    let outcomes = stage.run(&items, &progress(1)).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].outcome,
        Outcome::Success(layout.media_path("2024-01-01"))
    );
    let content = std::fs::read(layout.media_path("2024-01-01")).unwrap();
    assert_eq!(content, b"lecture one");
}

#[tokio::test]
async fn test_existing_media_or_transcript_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 2).await;
    std::fs::write(layout.media_path("2024-01-01"), b"old partial").unwrap();
    std::fs::write(layout.transcript_path("2024-01-02"), b"text").unwrap();

    let items = vec![
        WorkItem::new("2024-01-01", format!("{}/a.mp4", server.uri())),
        WorkItem::new("2024-01-02", format!("{}/b.mp4", server.uri())),
    ];
    let progress = progress(items.len());
    let outcomes = stage.run(&items, &progress).await;

    assert!(outcomes.iter().all(|o| o.outcome.is_skipped()));
    assert_eq!(progress.position(), 2);
    // Transcript alone is enough: media is not fetched back
    assert!(!layout.media_path("2024-01-02").exists());
    // Pre-existing media is trusted as-is
    assert_eq!(
        std::fs::read(layout.media_path("2024-01-01")).unwrap(),
        b"old partial"
    );
}

#[tokio::test]
async fn test_http_error_is_item_local() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 1).await;
    let items = vec![
        WorkItem::new("2024-01-01", format!("{}/missing.mp4", server.uri())),
        WorkItem::new("2024-01-02", format!("{}/ok.mp4", server.uri())),
    ];

    let mut outcomes = stage.run(&items, &progress(2)).await;
    outcomes.sort_by(|a, b| a.id.cmp(&b.id));

    match &outcomes[0].outcome {
        Outcome::Failed(reason) => assert!(reason.contains("404"), "reason: {}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(outcomes[1].outcome.is_success());
    assert!(layout.media_path("2024-01-02").exists());
}

#[tokio::test]
async fn test_connection_refused_is_item_local() {
    let temp = TempDir::new().unwrap();
    let (stage, _layout) = stage(&temp, 2).await;
    let items = vec![WorkItem::new("2024-01-01", "http://127.0.0.1:1/a.mp4")];

    let outcomes = stage.run(&items, &progress(1)).await;
    assert!(outcomes[0].outcome.is_failed());
}

#[tokio::test]
async fn test_size_mismatch_keeps_partial_file() {
    let (base, requests) = truncating_server(100, b"0123456789").await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 1).await;
    let items = vec![WorkItem::new("2024-01-01", format!("{}/a.mp4", base))];

    let outcomes = stage.run(&items, &progress(1)).await;

    match &outcomes[0].outcome {
        Outcome::Failed(reason) => assert!(reason.starts_with("incomplete"), "reason: {}", reason),
        other => panic!("expected incomplete, got {:?}", other),
    }
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    // Default policy keeps the partial file and never touches the transcript
    assert!(layout.media_path("2024-01-01").exists());
    assert!(!layout.transcript_path("2024-01-01").exists());
}

#[tokio::test]
async fn test_size_mismatch_delete_policy() {
    let (base, _requests) = truncating_server(100, b"0123456789").await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 1).await;
    let stage = stage.with_incomplete_policy(IncompletePolicy::Delete);
    let items = vec![WorkItem::new("2024-01-01", format!("{}/a.mp4", base))];

    let outcomes = stage.run(&items, &progress(1)).await;

    assert!(outcomes[0].outcome.is_failed());
    assert!(!layout.media_path("2024-01-01").exists());
}

#[tokio::test]
async fn test_size_mismatch_retry_once_policy() {
    let (base, requests) = truncating_server(100, b"0123456789").await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 1).await;
    let stage = stage.with_incomplete_policy(IncompletePolicy::RetryOnce);
    let items = vec![WorkItem::new("2024-01-01", format!("{}/a.mp4", base))];

    let outcomes = stage.run(&items, &progress(1)).await;

    assert!(outcomes[0].outcome.is_failed());
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert!(layout.media_path("2024-01-01").exists());
}

/// Serves `body-<n>` for `/media/<n>.mp4` after a delay, recording when
/// each request arrived.
struct SlowMedia {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowMedia {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        let name = request
            .url
            .path()
            .trim_start_matches("/media/")
            .trim_end_matches(".mp4");
        ResponseTemplate::new(200)
            .set_body_string(format!("body-{}", name))
            .set_delay(self.delay)
    }
}

/// Most requests that arrived within any `window` of each other
fn peak_overlap(arrivals: &[Instant], window: Duration) -> usize {
    let mut sorted = arrivals.to_vec();
    sorted.sort();
    (0..sorted.len())
        .map(|i| {
            sorted[i..]
                .iter()
                .take_while(|t| t.duration_since(sorted[i]) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_many_items_small_pool() {
    let delay = Duration::from_millis(100);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let server = MockServer::start().await;
    let count = 20;
    Mock::given(method("GET"))
        .respond_with(SlowMedia {
            delay,
            arrivals: arrivals.clone(),
        })
        .expect(count as u64)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let (stage, layout) = stage(&temp, 3).await;
    let items: Vec<WorkItem> = (0..count)
        .map(|i| {
            WorkItem::new(
                format!("2024-03-{:02}", i + 1),
                format!("{}/media/{}.mp4", server.uri(), i),
            )
        })
        .collect();

    let progress = progress(items.len());
    let outcomes = stage.run(&items, &progress).await;

    assert_eq!(outcomes.len(), count);
    assert_eq!(progress.position(), count as u64);
    let ids: HashSet<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids.len(), count);

    let media = layout.list_media().await.unwrap();
    assert_eq!(media.len(), count);
    for (i, item) in items.iter().enumerate() {
        let content = std::fs::read_to_string(layout.media_path(&item.id)).unwrap();
        assert_eq!(content, format!("body-{}", i));
    }

    // A permit is held until the delayed response is read, so requests
    // arriving closer together than the delay were in flight together
    let peak = peak_overlap(&arrivals.lock().unwrap(), delay * 9 / 10);
    assert!(peak <= 3, "{} requests in flight", peak);
    assert!(peak > 1, "downloads never overlapped");
}
