//! Reconciliation of freshly parsed items against the working collection.
//!
//! Each completed entry goes through [`reconcile`] as soon as the parser
//! closes it; [`finalize`] runs once at end of document to restore date
//! order and enforce the size bound.

use std::cmp::Ordering;

use super::collection::FeedCollection;
use super::item::FeedItem;

/// Upper bound on the number of articles kept (and cached) after a refresh.
pub const MAX_ITEMS: usize = 30;

/// What [`reconcile`] did with one incoming item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No existing item had this link; it was inserted at the front.
    Inserted,
    /// The item with this link was overwritten in place.
    Updated { index: usize },
    /// The item with this link already matched; nothing changed.
    Unchanged,
}

/// Running tally of merge outcomes over one parse pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeSummary {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated { .. } => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Merges one parsed item into the collection.
///
/// - Unknown link: inserted at index 0. Recency is only approximate until
///   [`finalize`] sorts.
/// - Known link whose stored copy has a different published date
///   (republished) or different raw HTML (edited): overwritten at its
///   current position, so the collection size does not change. An incoming
///   item without a date takes over the stored one and is never treated as
///   republished.
/// - Known link, same date and same HTML: left untouched.
///
/// The lookup and the mutation happen under one write lock.
pub fn reconcile(feeds: &FeedCollection, mut item: FeedItem) -> MergeOutcome {
    let mut items = feeds.write();

    // Links are unique in the collection, so the first match is the only one
    let Some(index) = items.iter().position(|existing| existing.is_same_article(&item)) else {
        tracing::debug!(link = %item.link, "New article");
        items.insert(0, item);
        return MergeOutcome::Inserted;
    };

    let existing = &items[index];
    // An unparseable datestamp keeps the date already known for the article
    if item.published.is_none() {
        item.published = existing.published;
    }
    let republished = existing.published != item.published;
    let edited = existing.raw_html_content != item.raw_html_content;
    if !republished && !edited {
        return MergeOutcome::Unchanged;
    }

    tracing::debug!(
        link = %item.link,
        index = index,
        republished = republished,
        edited = edited,
        "Updating article in place"
    );
    items[index] = item;
    MergeOutcome::Updated { index }
}

/// Sorts newest first, drops everything past `max_items` and returns the
/// committed snapshot.
///
/// Undated items sort after every dated one. The sort is stable, so items
/// with equal dates keep their relative order.
pub fn finalize(feeds: &FeedCollection, max_items: usize) -> Vec<FeedItem> {
    let mut items = feeds.write();
    items.sort_by(newest_first);
    if items.len() > max_items {
        tracing::debug!(
            dropped = items.len() - max_items,
            max_items = max_items,
            "Truncating oldest articles"
        );
        items.truncate(max_items);
    }
    items.clone()
}

fn newest_first(a: &FeedItem, b: &FeedItem) -> Ordering {
    // Option orders None before Some, so reversing puts undated items last
    b.published.cmp(&a.published)
}
