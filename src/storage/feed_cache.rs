use super::schema::Database;
use super::types::DatabaseError;
use crate::feed::FeedItem;

/// Slot holding the serialized article list.
pub const FEED_CACHE_KEY: &str = "feed_cache";

/// Offline copy of the article list.
///
/// Each save is a full snapshot that replaces the previous one; there is no
/// incremental persistence. The value is a JSON array of [`FeedItem`].
#[derive(Clone)]
pub struct FeedCache {
    db: Database,
}

impl FeedCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Overwrites the cached snapshot with `items`, preserving their order.
    pub async fn save(&self, items: &[FeedItem]) -> Result<(), DatabaseError> {
        let encoded = serde_json::to_vec(items)?;
        self.db.set_value(FEED_CACHE_KEY, &encoded).await?;
        tracing::debug!(items = items.len(), bytes = encoded.len(), "Saved feed cache");
        Ok(())
    }

    /// Reads the cached snapshot.
    ///
    /// Never fails: a missing slot, a storage error and a value that does
    /// not decode as a list of items all count as a cache miss.
    pub async fn load(&self) -> Option<Vec<FeedItem>> {
        let encoded = match self.db.get_value(FEED_CACHE_KEY).await {
            Ok(Some(encoded)) => encoded,
            Ok(None) => {
                tracing::debug!("No feed cache found");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read feed cache, treating as empty");
                return None;
            }
        };

        match serde_json::from_slice::<Vec<FeedItem>>(&encoded) {
            Ok(items) => {
                tracing::debug!(items = items.len(), "Loaded feed cache");
                Some(items)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bytes = encoded.len(),
                    "Feed cache is corrupt, ignoring it"
                );
                None
            }
        }
    }

    /// Drops the cached snapshot.
    pub async fn clear(&self) -> Result<(), DatabaseError> {
        self.db.delete_value(FEED_CACHE_KEY).await?;
        Ok(())
    }
}
