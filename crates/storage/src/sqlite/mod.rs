use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{ItemRepository, ProgressStore, SessionSummaryRepository, Storage};

mod item_repo;
mod mapping;
mod migrate;
mod progress_repo;
mod session_summary_repo;

/// Pool tuning for the progress database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before `SQLITE_BUSY`.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Item, progress and summary storage over one `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect with the default [`PoolConfig`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is invalid or no connection can be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, PoolConfig::default()).await
    }

    /// Connect to `database_url` with foreign keys enforced and WAL journaling.
    ///
    /// Progress rows cascade with their item, so `foreign_keys` must be on
    /// for every pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is invalid or no connection can be opened.
    pub async fn connect_with(
        database_url: &str,
        config: PoolConfig,
    ) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        tracing::debug!(
            url = database_url,
            max_connections = config.max_connections,
            "sqlite pool connected"
        );
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and expose one `SQLite` pool through every repository seam.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = Arc::new(SqliteRepository::connect(database_url).await?);
        repo.migrate().await?;
        Ok(Self {
            items: Arc::clone(&repo) as Arc<dyn ItemRepository>,
            progress: Arc::clone(&repo) as Arc<dyn ProgressStore>,
            session_summaries: repo as Arc<dyn SessionSummaryRepository>,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[tokio::test]
    async fn every_pooled_connection_enforces_foreign_keys() {
        let config = PoolConfig {
            max_connections: 2,
            ..PoolConfig::default()
        };
        let repo = SqliteRepository::connect_with(
            "sqlite:file:memdb_pool_config?mode=memory&cache=shared",
            config,
        )
        .await
        .unwrap();

        let mut first = repo.pool().acquire().await.unwrap();
        let mut second = repo.pool().acquire().await.unwrap();
        for conn in [&mut first, &mut second] {
            let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys;")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(enabled, 1);
        }
    }

    #[tokio::test]
    async fn missing_database_file_is_not_created() {
        let err = SqliteRepository::connect("sqlite:/nonexistent-kioku-dir/progress.sqlite3").await;
        assert!(matches!(err, Err(SqliteInitError::Sqlx(_))));
    }
}
