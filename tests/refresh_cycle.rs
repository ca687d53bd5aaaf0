//! Integration tests for the refresh cycle: cache restore, fetch, parse,
//! merge, finalize and persist.
//!
//! Each test runs against its own wiremock server and in-memory SQLite
//! database.

use announcer::feed::{FeedItem, Feeder, FeederEvent, FeederSettings, FetchError, RefreshError};
use announcer::storage::{Database, FeedCache};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(id: usize, published: &str, html: &str) -> String {
    format!(
        r#"<entry>
  <id>tag:blogger.com,1999:blog-1.post-{id}</id>
  <published>{published}</published>
  <title type='text'>Post {id}</title>
  <content type='html'>{html}</content>
  <link rel='alternate' type='text/html'
        href='http://studentsblog.sst.edu.sg/2024/01/post-{id}.html' title='Post {id}'/>
  <author><name>Admin</name></author>
</entry>"#
    )
}

fn document(entries: &[String]) -> String {
    format!(
        r#"<?xml version='1.0' encoding='UTF-8'?>
<feed xmlns='http://www.w3.org/2005/Atom'>
  <title type='text'>SST Students' Blog</title>
  <link rel='alternate' type='text/html' href='http://studentsblog.sst.edu.sg/'/>
  {}
</feed>"#,
        entries.join("\n")
    )
}

/// Entry `id` published on day `id` of January 2024.
fn dated_entry(id: usize) -> String {
    entry(
        id,
        &format!("2024-01-{:02}T08:00:00.000+08:00", id),
        &format!("&lt;p&gt;Body {id}&lt;/p&gt;"),
    )
}

fn link(id: usize) -> String {
    format!("http://studentsblog.sst.edu.sg/2024/01/post-{id}.html")
}

async fn serve(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn test_feeder(server: &MockServer) -> (FeedCache, Feeder) {
    let db = Database::open(":memory:").await.unwrap();
    let cache = FeedCache::new(db);
    let settings = FeederSettings {
        feed_url: format!("{}/feed", server.uri()),
        ..FeederSettings::default()
    };
    let feeder = Feeder::new(reqwest::Client::new(), cache.clone(), settings);
    (cache, feeder)
}

fn links(items: &[FeedItem]) -> Vec<String> {
    items.iter().map(|i| i.link.clone()).collect()
}

// ============================================================================
// Successful Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_sorts_truncates_and_persists() {
    let server = MockServer::start().await;
    // Shuffled order, more entries than the collection keeps
    let entries: Vec<String> = (1..=31)
        .rev()
        .step_by(2)
        .chain((2..=30).step_by(2))
        .map(dated_entry)
        .collect();
    assert_eq!(entries.len(), 31);
    serve(&server, document(&entries)).await;

    let (cache, feeder) = test_feeder(&server).await;
    let items = feeder.refresh().await.unwrap();

    assert_eq!(items.len(), 30);
    let expected: Vec<String> = (2..=31).rev().map(link).collect();
    assert_eq!(links(&items), expected);
    assert!(items.windows(2).all(|w| w[0].published >= w[1].published));

    assert_eq!(items[0].title, "Post 31");
    assert_eq!(items[0].author, "Admin");
    assert_eq!(items[0].raw_html_content, "<p>Body 31</p>");
    assert_eq!(items[0].stripped_html_content, "Body 31");

    assert_eq!(cache.load().await.unwrap(), items);
    assert_eq!(feeder.collection().snapshot(), items);
    assert!(!feeder.is_refreshing());
}

#[tokio::test]
async fn test_repeated_refresh_is_idempotent() {
    let server = MockServer::start().await;
    serve(&server, document(&[dated_entry(2), dated_entry(1)])).await;

    let (cache, feeder) = test_feeder(&server).await;
    let first = feeder.refresh().await.unwrap();
    let second = feeder.refresh().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.len(), 2);
    assert_eq!(cache.load().await.unwrap(), second);
}

#[tokio::test]
async fn test_refresh_merges_with_cached_articles() {
    let server = MockServer::start().await;
    // Post 1 was edited since it was cached, post 3 is new
    let edited = entry(
        1,
        "2024-01-01T08:00:00.000+08:00",
        "&lt;p&gt;Corrected body&lt;/p&gt;",
    );
    serve(&server, document(&[dated_entry(3), edited])).await;

    let (cache, feeder) = test_feeder(&server).await;
    let stale = FeedItem {
        title: "Post 1".to_string(),
        link: link(1),
        author: "Admin".to_string(),
        published: Some(announcer::feed::parse_published("2024-01-01T08:00:00.000+08:00").unwrap()),
        raw_html_content: "<p>Body 1</p>".to_string(),
        stripped_html_content: "Body 1".to_string(),
    };
    let older = FeedItem {
        link: "http://studentsblog.sst.edu.sg/2023/12/older.html".to_string(),
        title: "Older".to_string(),
        published: Some(announcer::feed::parse_published("2023-12-01T08:00:00.000+08:00").unwrap()),
        ..FeedItem::default()
    };
    cache.save(&[stale, older]).await.unwrap();

    assert!(feeder.load_cached().await.unwrap());
    let items = feeder.refresh().await.unwrap();

    assert_eq!(
        links(&items),
        vec![
            link(3),
            link(1),
            "http://studentsblog.sst.edu.sg/2023/12/older.html".to_string()
        ]
    );
    assert_eq!(items[1].stripped_html_content, "Corrected body");
    assert_eq!(cache.load().await.unwrap(), items);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_http_error_leaves_cache_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (cache, feeder) = test_feeder(&server).await;
    let cached = vec![FeedItem {
        link: link(1),
        title: "Cached".to_string(),
        ..FeedItem::default()
    }];
    cache.save(&cached).await.unwrap();
    assert!(feeder.load_cached().await.unwrap());

    let err = feeder.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        RefreshError::Network(FetchError::HttpStatus(503))
    ));
    assert_eq!(cache.load().await.unwrap(), cached);
    assert_eq!(feeder.collection().snapshot(), cached);
}

#[tokio::test]
async fn test_malformed_feed_keeps_partial_entries_without_persisting() {
    let server = MockServer::start().await;
    let body = format!(
        "<feed xmlns='http://www.w3.org/2005/Atom'>{}{}<entry><title>Cut off",
        dated_entry(1),
        dated_entry(2)
    );
    serve(&server, body).await;

    let (cache, feeder) = test_feeder(&server).await;
    let err = feeder.refresh().await.unwrap_err();

    assert!(matches!(err, RefreshError::Parse(_)));
    // Entries are merged as they close, ahead of the error
    assert_eq!(feeder.collection().len(), 2);
    assert!(cache.load().await.is_none());
}

#[tokio::test]
async fn test_concurrent_refresh_is_rejected_as_busy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(document(&[dated_entry(1)]))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (cache, feeder) = test_feeder(&server).await;
    cache.save(&[FeedItem { link: link(9), ..FeedItem::default() }]).await.unwrap();
    let feeder = Arc::new(feeder);

    let background = {
        let feeder = Arc::clone(&feeder);
        tokio::spawn(async move { feeder.refresh().await })
    };
    for _ in 0..100 {
        if feeder.is_refreshing() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(feeder.is_refreshing());

    let err = feeder.refresh().await.unwrap_err();
    assert!(matches!(err, RefreshError::Busy));

    // The cached snapshot must not replace the collection mid-refresh
    let err = feeder.load_cached().await.unwrap_err();
    assert!(matches!(err, RefreshError::Busy));
    assert!(feeder.collection().is_empty());

    let items = background.await.unwrap().unwrap();
    assert_eq!(links(&items), vec![link(1)]);
    assert!(!feeder.is_refreshing());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_spawned_refresh_reports_progress_then_finished() {
    let server = MockServer::start().await;
    let entries: Vec<String> = (1..=20).map(dated_entry).collect();
    serve(&server, document(&entries)).await;

    let (tx, mut rx) = mpsc::channel(256);
    let (cache, feeder) = test_feeder(&server).await;
    cache.save(&[FeedItem { link: link(1), ..FeedItem::default() }]).await.unwrap();
    let feeder = Arc::new(feeder.with_events(tx));

    assert!(feeder.load_cached().await.unwrap());
    assert!(matches!(rx.recv().await, Some(FeederEvent::LoadedFromCache)));

    let handle = feeder.spawn_refresh();
    let mut progress = Vec::new();
    let finished = loop {
        match rx.recv().await {
            Some(FeederEvent::Progress(fraction)) => progress.push(fraction),
            Some(FeederEvent::Finished(result)) => break result,
            Some(FeederEvent::LoadedFromCache) => panic!("unexpected cache event"),
            None => panic!("event channel closed before Finished"),
        }
    };
    handle.await.unwrap();

    let items = finished.unwrap();
    assert_eq!(items.len(), 20);
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress.iter().all(|f| (0.0..=1.0).contains(f)));
}

#[tokio::test]
async fn test_load_cached_without_snapshot_sends_nothing() {
    let server = MockServer::start().await;
    let (tx, mut rx) = mpsc::channel(8);
    let (_cache, feeder) = test_feeder(&server).await;
    let feeder = feeder.with_events(tx);

    assert!(!feeder.load_cached().await.unwrap());
    assert!(feeder.collection().is_empty());
    assert!(rx.try_recv().is_err());
}
