use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database (used by tests).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Pre-create the file user-only so cached articles are never world-readable
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(
                        path = %path,
                        error = %e,
                        "Failed to set database file permissions"
                    );
                }
            } else if db_path.parent().is_some_and(|p| p.exists()) {
                // If creation fails, SQLite will report the error at connect_with.
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok();
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // One writer (the refresh task) and occasional readers
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::Other(e) => DatabaseError::Migration(e.to_string()),
            locked => locked,
        })?;
        Ok(db)
    }

    /// Create the key-value table. Idempotent.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_value (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Read the value stored under `key`, or `None` if the slot is empty.
    pub async fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, DatabaseError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM key_value WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Store `value` under `key`, replacing whatever was there (UPSERT).
    pub async fn set_value(&self, key: &str, value: &[u8]) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO key_value (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Empty the slot under `key`. Returns `true` if something was removed.
    pub async fn delete_value(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM key_value WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_value_missing() {
        let db = test_db().await;
        assert_eq!(db.get_value("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get_value() {
        let db = test_db().await;
        db.set_value("slot", b"hello").await.unwrap();
        assert_eq!(db.get_value("slot").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_set_value_overwrites() {
        let db = test_db().await;
        db.set_value("slot", b"first").await.unwrap();
        db.set_value("slot", b"second").await.unwrap();
        assert_eq!(db.get_value("slot").await.unwrap(), Some(b"second".to_vec()));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM key_value")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_delete_value() {
        let db = test_db().await;
        db.set_value("slot", b"x").await.unwrap();
        assert!(db.delete_value("slot").await.unwrap());
        assert!(!db.delete_value("slot").await.unwrap());
        assert_eq!(db.get_value("slot").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reopen_file_database_keeps_values() {
        let dir = std::env::temp_dir().join(format!("announcer_db_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.db");
        let path_str = path.to_str().unwrap();

        {
            let db = Database::open(path_str).await.unwrap();
            db.set_value("slot", b"persisted").await.unwrap();
            db.pool.close().await;
        }
        let db = Database::open(path_str).await.unwrap();
        assert_eq!(db.get_value("slot").await.unwrap(), Some(b"persisted".to_vec()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        db.pool.close().await;
        std::fs::remove_dir_all(&dir).ok();
    }
}
