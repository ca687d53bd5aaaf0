use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::item::FeedItem;

/// The ordered set of articles shown to the reader.
///
/// A cheap-to-clone handle over a single `RwLock`: presentation code reads
/// (`len`, `get`, `snapshot`, `filter`) at any time while a background
/// refresh mutates through [`FeedCollection::write`]. Every read and every
/// mutation serializes on the same lock, so readers only ever observe a
/// collection between two complete mutations.
///
/// A panic while holding the lock does not make the collection unusable;
/// the poisoned guard is recovered and the last written state is used.
#[derive(Debug, Clone, Default)]
pub struct FeedCollection {
    inner: Arc<RwLock<Vec<FeedItem>>>,
}

impl FeedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<FeedItem>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns a copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<FeedItem> {
        self.read().get(index).cloned()
    }

    /// Copies out the whole collection in its current order.
    pub fn snapshot(&self) -> Vec<FeedItem> {
        self.read().clone()
    }

    /// Copies out the items matching `predicate`, preserving order.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<FeedItem>
    where
        F: FnMut(&FeedItem) -> bool,
    {
        self.read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Replaces the whole collection, e.g. with the cached snapshot at startup.
    ///
    /// Crate-private like [`FeedCollection::write`]; the feeder only calls it
    /// while no refresh is in flight.
    pub(crate) fn reset(&self, items: Vec<FeedItem>) {
        *self.write() = items;
    }

    /// Locks the collection for a multi-step mutation.
    ///
    /// Crate-private: only the merge engine mutates the collection.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<FeedItem>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<FeedItem>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
