use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::collection::FeedCollection;
use super::fetcher::{fetch_feed, FetchError, FetchOptions};
use super::item::FeedItem;
use super::merge::{finalize, MAX_ITEMS};
use super::parser::{parse_into, ParseError, ParseOptions};
use crate::storage::FeedCache;

/// Feed endpoint used when no other URL is configured.
pub const DEFAULT_FEED_URL: &str = "https://node1.sstinc.org/api/cache/blogrss.csv";

/// Terminal failures of one refresh cycle.
///
/// Date validation problems and cache decode/write problems are handled
/// inside the pipeline and never show up here.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Transport or HTTP failure; the collection and the cache are untouched
    #[error("Network error: {0}")]
    Network(#[from] FetchError),
    /// Malformed feed; entries merged before the error are kept
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Another refresh is still in flight
    #[error("A refresh is already in progress")]
    Busy,
}

/// Notifications for the presentation layer.
#[derive(Debug)]
pub enum FeederEvent {
    /// The collection was populated from the offline cache.
    LoadedFromCache,
    /// Fraction of the response downloaded, in `[0, 1]`. Advisory only.
    Progress(f32),
    /// The refresh cycle ended; on success, the committed collection.
    Finished(Result<Vec<FeedItem>, RefreshError>),
}

#[derive(Debug, Clone)]
pub struct FeederSettings {
    pub feed_url: String,
    pub fetch: FetchOptions,
    pub parse: ParseOptions,
    pub max_items: usize,
}

impl Default for FeederSettings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            fetch: FetchOptions::default(),
            parse: ParseOptions::default(),
            max_items: MAX_ITEMS,
        }
    }
}

/// Owns the article collection and runs refresh cycles against it.
///
/// One cycle is: download the feed, parse it entry by entry (each entry is
/// reconciled as soon as it closes), sort and truncate, then persist the
/// committed snapshot. Only one cycle runs at a time; a second request made
/// while one is in flight fails fast with [`RefreshError::Busy`].
pub struct Feeder {
    client: reqwest::Client,
    cache: FeedCache,
    feeds: FeedCollection,
    settings: FeederSettings,
    events: Option<mpsc::Sender<FeederEvent>>,
    refreshing: AtomicBool,
}

impl Feeder {
    pub fn new(client: reqwest::Client, cache: FeedCache, settings: FeederSettings) -> Self {
        Self {
            client,
            cache,
            feeds: FeedCollection::new(),
            settings,
            events: None,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Sends [`FeederEvent`]s to `events` from now on.
    pub fn with_events(mut self, events: mpsc::Sender<FeederEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Shared handle to the collection for read access.
    pub fn collection(&self) -> FeedCollection {
        self.feeds.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Populates the collection from the offline cache.
    ///
    /// Returns `Ok(true)` (and emits [`FeederEvent::LoadedFromCache`]) if a
    /// usable snapshot was found. A missing or corrupt cache leaves the
    /// collection as it was.
    ///
    /// Holds the same in-flight flag as [`Feeder::refresh`], so the cached
    /// snapshot can never replace the collection in the middle of a merge.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::Busy`] - A refresh is running; nothing was done
    pub async fn load_cached(&self) -> Result<bool, RefreshError> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            tracing::debug!("Cache load requested while a refresh is in flight");
            return Err(RefreshError::Busy);
        };

        let Some(items) = self.cache.load().await else {
            return Ok(false);
        };
        tracing::info!(items = items.len(), "Restored articles from cache");
        self.feeds.reset(items);
        self.emit(FeederEvent::LoadedFromCache).await;
        Ok(true)
    }

    /// Runs one refresh cycle and returns the committed collection.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::Busy`] - Another cycle is running; nothing was done
    /// - [`RefreshError::Network`] - Download failed; nothing was changed
    /// - [`RefreshError::Parse`] - Feed was malformed; entries reconciled
    ///   before the error stay in the collection, the cache is not written
    pub async fn refresh(&self) -> Result<Vec<FeedItem>, RefreshError> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            tracing::debug!("Refresh requested while another is in flight");
            return Err(RefreshError::Busy);
        };

        let events = self.events.clone();
        let bytes = fetch_feed(
            &self.client,
            &self.settings.feed_url,
            &self.settings.fetch,
            |fraction| {
                if let Some(tx) = &events {
                    // Dropped progress updates are fine; they must never stall the download
                    let _ = tx.try_send(FeederEvent::Progress(fraction));
                }
            },
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(url = %self.settings.feed_url, error = %e, "Feed download failed")
        })?;

        let summary = parse_into(&bytes, &self.feeds, self.settings.parse.clone())
            .inspect_err(|e| tracing::warn!(error = %e, "Feed parse failed"))?;

        let items = finalize(&self.feeds, self.settings.max_items);
        if let Err(e) = self.cache.save(&items).await {
            tracing::warn!(error = %e, "Failed to persist feed cache");
        }

        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            total = items.len(),
            "Feed refreshed"
        );
        Ok(items)
    }

    /// Runs [`Feeder::refresh`] on a background task and reports the
    /// result as [`FeederEvent::Finished`].
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let feeder = Arc::clone(self);
        tokio::spawn(async move {
            let result = feeder.refresh().await;
            feeder.emit(FeederEvent::Finished(result)).await;
        })
    }

    async fn emit(&self, event: FeederEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event).await {
                tracing::debug!(error = %e, "Event receiver dropped");
            }
        }
    }
}

/// Holds the in-flight flag for the lifetime of one refresh cycle.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
