//! SQL-backed cache stores over sqlx connection pools.
//!
//! One implementation per engine. They share a table shape
//! (`easyclient_cache (cache_key, cache_value)`) and differ only in
//! placeholder and upsert dialect. The caller owns the pool; the backend
//! creates its table on construction and `flush` removes only rows under
//! this backend's key prefix.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{MySqlPool, PgPool, Row, SqlitePool};

use crate::error::{ClientError, Result};

use super::{CacheBackend, CacheOptions};

fn cache_err(e: sqlx::Error) -> ClientError {
    ClientError::Cache(e.to_string())
}

fn encode(value: &Value) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| ClientError::Cache(format!("failed to encode cache value: {e}")))
}

fn decode(text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| ClientError::Cache(format!("stored cache value is not valid JSON: {e}")))
}

// ── SQLite ───────────────────────────────────────────────────────────────────

/// Cache backend over a SQLite pool.
pub struct SqliteCache {
    pool: SqlitePool,
    options: CacheOptions,
}

impl SqliteCache {
    /// Wrap a pool, creating the cache table if needed.
    pub async fn new(pool: SqlitePool, options: CacheOptions) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS easyclient_cache \
             (cache_key TEXT PRIMARY KEY, cache_value TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .map_err(cache_err)?;
        Ok(Self { pool, options })
    }
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT cache_value FROM easyclient_cache WHERE cache_key = ?")
            .bind(self.options.prefixed(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(cache_err)?;
        match row {
            Some(row) => {
                let text: String = row.try_get("cache_value").map_err(cache_err)?;
                Ok(Some(decode(&text)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, value: &Value, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO easyclient_cache (cache_key, cache_value) VALUES (?, ?) \
             ON CONFLICT(cache_key) DO UPDATE SET cache_value = excluded.cache_value",
        )
        .bind(self.options.prefixed(key))
        .bind(encode(value)?)
        .execute(&self.pool)
        .await
        .map_err(cache_err)?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        sqlx::query("DELETE FROM easyclient_cache WHERE cache_key LIKE ?")
            .bind(format!("{}%", self.options.key_prefix))
            .execute(&self.pool)
            .await
            .map_err(cache_err)?;
        Ok(())
    }
}

// ── PostgreSQL ───────────────────────────────────────────────────────────────

/// Cache backend over a PostgreSQL pool.
pub struct PostgresCache {
    pool: PgPool,
    options: CacheOptions,
}

impl PostgresCache {
    /// Wrap a pool, creating the cache table if needed.
    pub async fn new(pool: PgPool, options: CacheOptions) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS easyclient_cache \
             (cache_key TEXT PRIMARY KEY, cache_value TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .map_err(cache_err)?;
        Ok(Self { pool, options })
    }
}

#[async_trait]
impl CacheBackend for PostgresCache {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT cache_value FROM easyclient_cache WHERE cache_key = $1")
            .bind(self.options.prefixed(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(cache_err)?;
        match row {
            Some(row) => {
                let text: String = row.try_get("cache_value").map_err(cache_err)?;
                Ok(Some(decode(&text)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, value: &Value, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO easyclient_cache (cache_key, cache_value) VALUES ($1, $2) \
             ON CONFLICT (cache_key) DO UPDATE SET cache_value = EXCLUDED.cache_value",
        )
        .bind(self.options.prefixed(key))
        .bind(encode(value)?)
        .execute(&self.pool)
        .await
        .map_err(cache_err)?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        sqlx::query("DELETE FROM easyclient_cache WHERE cache_key LIKE $1")
            .bind(format!("{}%", self.options.key_prefix))
            .execute(&self.pool)
            .await
            .map_err(cache_err)?;
        Ok(())
    }
}

// ── MySQL ────────────────────────────────────────────────────────────────────

/// Cache backend over a MySQL pool.
pub struct MySqlCache {
    pool: MySqlPool,
    options: CacheOptions,
}

impl MySqlCache {
    /// Wrap a pool, creating the cache table if needed.
    pub async fn new(pool: MySqlPool, options: CacheOptions) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS easyclient_cache \
             (cache_key VARCHAR(255) PRIMARY KEY, cache_value TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .map_err(cache_err)?;
        Ok(Self { pool, options })
    }
}

#[async_trait]
impl CacheBackend for MySqlCache {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT cache_value FROM easyclient_cache WHERE cache_key = ?")
            .bind(self.options.prefixed(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(cache_err)?;
        match row {
            Some(row) => {
                let text: String = row.try_get("cache_value").map_err(cache_err)?;
                Ok(Some(decode(&text)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, value: &Value, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO easyclient_cache (cache_key, cache_value) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE cache_value = VALUES(cache_value)",
        )
        .bind(self.options.prefixed(key))
        .bind(encode(value)?)
        .execute(&self.pool)
        .await
        .map_err(cache_err)?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        sqlx::query("DELETE FROM easyclient_cache WHERE cache_key LIKE ?")
            .bind(format!("{}%", self.options.key_prefix))
            .execute(&self.pool)
            .await
            .map_err(cache_err)?;
        Ok(())
    }
}
