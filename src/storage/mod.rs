mod feed_cache;
mod schema;
mod types;

pub use feed_cache::{FeedCache, FEED_CACHE_KEY};
pub use schema::Database;
pub use types::DatabaseError;
