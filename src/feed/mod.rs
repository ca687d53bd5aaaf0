//! Feed ingestion pipeline.
//!
//! - **Fetching**: one streaming HTTP GET with progress reporting
//! - **Parsing**: XML event sequence driving an entry-assembly state machine
//! - **Merging**: insert / update-in-place / skip against the working collection
//! - **Orchestration**: cache restore, refresh cycles, events for the UI
//!
//! # Architecture
//!
//! - [`item`] - The article record and its datestamp format
//! - [`collection`] - Lock-guarded ordered list shared with readers
//! - [`fetcher`] - HTTP download with Content-Length based progress
//! - [`parser`] - `quick-xml` event iterator and the feed parser
//! - [`merge`] - Reconciliation and the finalize (sort + truncate) step
//! - [`feeder`] - Ties the steps together and persists through [`crate::storage`]
//!
//! # Example
//!
//! ```ignore
//! let feeder = Arc::new(Feeder::new(client, FeedCache::new(db), settings).with_events(tx));
//! feeder.load_cached().await?;
//! feeder.spawn_refresh();
//! ```

pub mod collection;
pub mod feeder;
pub mod fetcher;
pub mod item;
pub mod merge;
pub mod parser;

pub use collection::FeedCollection;
pub use feeder::{Feeder, FeederEvent, FeederSettings, RefreshError, DEFAULT_FEED_URL};
pub use fetcher::{fetch_feed, DownloadProgress, FetchError, FetchOptions};
pub use item::{parse_published, FeedItem, PUBLISHED_FORMAT};
pub use merge::{finalize, reconcile, MergeOutcome, MergeSummary, MAX_ITEMS};
pub use parser::{parse_into, FeedParser, ParseError, ParseOptions, XmlEvent, XmlEvents};
