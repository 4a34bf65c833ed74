//! SQLite key-value table backing the cache metadata.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{SettingsStore, SettingsTransaction},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, Transaction};
use std::path::PathBuf;
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> BridgeError {
    move |e| BridgeError::DatabaseError(format!("{}: {}", action, e))
}

async fn upsert<'e, E>(executor: E, key: &str, value: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(chrono::Utc::now().timestamp())
    .execute(executor)
    .await
    .map_err(db_error("write setting"))?;
    Ok(())
}

async fn remove<'e, E>(executor: E, key: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(executor)
        .await
        .map_err(db_error("delete setting"))?;
    Ok(())
}

/// String settings persisted in a single SQLite table.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Opens (or creates) the database file, creating its directory first.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(db_error("open settings database"))?;

        debug!(path = ?db_path, "Opened settings database");
        Self::with_schema(pool).await
    }

    pub async fn in_memory() -> Result<Self> {
        // One connection, otherwise each query sees its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_error("open settings database"))?;

        Self::with_schema(pool).await
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_error("create settings table"))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        upsert(&self.pool, key, value).await?;
        debug!(key, "Stored setting");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("read setting"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        remove(&self.pool, key).await?;
        debug!(key, "Deleted setting");
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn SettingsTransaction + Send>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin transaction"))?;
        Ok(Box::new(SqliteSettingsTransaction { tx: Some(tx) }))
    }
}

struct SqliteSettingsTransaction {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteSettingsTransaction {
    fn open(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| BridgeError::OperationFailed("transaction already finished".to_string()))
    }

    fn finish(&mut self) -> Result<Transaction<'static, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("transaction already finished".to_string()))
    }
}

#[async_trait]
impl SettingsTransaction for SqliteSettingsTransaction {
    async fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        upsert(&mut **self.open()?, key, value).await
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        remove(&mut **self.open()?, key).await
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish()?
            .commit()
            .await
            .map_err(db_error("commit settings"))?;
        debug!("Committed settings transaction");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish()?
            .rollback()
            .await
            .map_err(db_error("roll back settings"))
    }
}
