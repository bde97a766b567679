use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::OnceCell;
use tracing::info;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// A pool that is opened on first use and then reused for the life of the process.
///
/// Concurrent first callers wait on the same connection attempt. A failed attempt
/// leaves the cell empty so the next caller retries.
pub struct SharedPool {
    database_url: String,
    max_connections: u32,
    timeout_secs: u64,
    cell: OnceCell<DbPool>,
}

impl SharedPool {
    pub fn new(database_url: impl Into<String>, max_connections: u32, timeout_secs: u64) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections,
            timeout_secs,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<&DbPool, sqlx::Error> {
        self.cell
            .get_or_try_init(|| async {
                let pool = connect_with_settings(
                    &self.database_url,
                    self.max_connections,
                    self.timeout_secs,
                )
                .await?;
                info!(
                    event_name = "system.db.connected",
                    max_connections = self.max_connections,
                    "database pool opened"
                );
                Ok::<_, sqlx::Error>(pool)
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }

    /// Closes the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.cell.get() {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SharedPool;

    #[tokio::test]
    async fn shared_pool_connects_once_for_concurrent_callers() {
        let shared = SharedPool::new("sqlite::memory:", 1, 5);
        assert!(!shared.is_connected());

        let (first, second) = tokio::join!(shared.get(), shared.get());
        let first = first.expect("first connect");
        let second = second.expect("second connect");

        assert!(std::ptr::eq(first, second));
        assert!(shared.is_connected());

        shared.close().await;
        assert!(shared.get().await.expect("cached pool").is_closed());
    }

    #[tokio::test]
    async fn shared_pool_retries_after_failed_connect() {
        let shared = SharedPool::new("sqlite:/nonexistent-corner-dir/corner.db", 1, 1);

        assert!(shared.get().await.is_err());
        assert!(!shared.is_connected());
    }
}
