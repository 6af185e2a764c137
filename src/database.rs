use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

use crate::config::DatabaseConfig;
use crate::repository::{ConfigStore, ListingRepository};
use crate::Result;

/// Owns the connection pool shared by the API and the orchestrator. The
/// scraper subprocess opens the same file on its own, so WAL mode and a busy
/// timeout are required for readers and the external writer to coexist.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = PathBuf::from(&config.path);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "Database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Database migrations applied");

        Ok(Self { pool, path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Filesystem path handed to the scraper via `--db`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn listings(&self) -> ListingRepository {
        ListingRepository::new(self.pool.clone())
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.pool.clone())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
