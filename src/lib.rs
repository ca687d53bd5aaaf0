//! Feed ingestion for the announcer news reader.
//!
//! Streams the blog's Atom feed, parses it incrementally, reconciles the
//! entries against the article list restored from the offline cache and
//! persists the result for the next start.

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
