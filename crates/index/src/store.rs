//! Index store trait and the SQLite implementation.

use crate::error::IndexResult;
use crate::repos::{KeyRepo, ListRepo, resolve_range};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

/// Combined index store trait.
#[async_trait]
pub trait IndexStore: KeyRepo + ListRepo + Send + Sync {
    /// Store a value and push its key to the head of a list.
    ///
    /// The default runs two sequential writes; a failure between them leaves
    /// the value stored but unlisted. Backends with transactions override it.
    async fn insert_listed(&self, list_key: &str, key: &str, value: &str) -> IndexResult<u64> {
        self.set(key, value).await?;
        self.list_push(list_key, key).await
    }

    /// Check backend connectivity and health.
    async fn health_check(&self) -> IndexResult<()>;

    /// Backend identifier for logging.
    fn backend_name(&self) -> &'static str;
}

/// SQLite-based index store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) an index database and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serialises writers and keeps list positions consistent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema.
    pub async fn migrate(&self) -> IndexResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

async fn push_head(conn: &mut SqliteConnection, key: &str, member: &str) -> IndexResult<u64> {
    let head: Option<i64> =
        sqlx::query_scalar("SELECT MIN(position) FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
    let position = head.map_or(0, |p| p - 1);

    sqlx::query("INSERT INTO kv_lists (list_key, position, member) VALUES (?, ?, ?)")
        .bind(key)
        .bind(position)
        .bind(member)
        .execute(&mut *conn)
        .await?;

    let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_lists WHERE list_key = ?")
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;
    Ok(len as u64)
}

async fn upsert(conn: &mut SqliteConnection, key: &str, value: &str) -> IndexResult<()> {
    sqlx::query(
        "INSERT INTO kv (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl KeyRepo for SqliteStore {
    async fn get(&self, key: &str) -> IndexResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> IndexResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut conn, key, value).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> IndexResult<bool> {
        let mut tx = self.pool.begin().await?;
        let values = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let members = sqlx::query("DELETE FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(values + members > 0)
    }
}

#[async_trait]
impl ListRepo for SqliteStore {
    #[instrument(skip(self))]
    async fn list_push(&self, key: &str, member: &str) -> IndexResult<u64> {
        let mut tx = self.pool.begin().await?;
        let len = push_head(&mut tx, key, member).await?;
        tx.commit().await?;
        Ok(len)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> IndexResult<Vec<String>> {
        let len = self.list_len(key).await?;
        let Some((offset, count)) = resolve_range(len, start, stop) else {
            return Ok(Vec::new());
        };

        let members = sqlx::query_scalar::<_, String>(
            "SELECT member FROM kv_lists WHERE list_key = ? ORDER BY position ASC LIMIT ? OFFSET ?",
        )
        .bind(key)
        .bind(count as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn list_len(&self, key: &str) -> IndexResult<u64> {
        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(len as u64)
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    #[instrument(skip(self, value))]
    async fn insert_listed(&self, list_key: &str, key: &str, value: &str) -> IndexResult<u64> {
        let mut tx = self.pool.begin().await?;
        upsert(&mut tx, key, value).await?;
        let len = push_head(&mut tx, list_key, key).await?;
        tx.commit().await?;
        Ok(len)
    }

    async fn health_check(&self) -> IndexResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Lists are ordered by position; pushes to the head take MIN(position) - 1.
CREATE TABLE IF NOT EXISTS kv_lists (
    list_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (list_key, position)
);
"#;
