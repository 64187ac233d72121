//! Response memoization — cache backend capability and backend selection.
//!
//! Backends are a closed set selected through [`CacheConfig`]: a JSON store
//! file on disk, or a SQL table reached through a caller-supplied sqlx pool
//! (SQLite, PostgreSQL, or MySQL). All backends speak the same
//! `load`/`save`/`flush` capability and apply the same fixed key prefix so
//! they never collide with unrelated users of the store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{MySqlPool, PgPool, SqlitePool};

use crate::error::Result;

pub mod file;
pub mod sql;

pub use file::FileCache;
pub use sql::{MySqlCache, PostgresCache, SqliteCache};

/// Well-known key holding the cache-version stamp.
pub const CACHE_VERSION_KEY: &str = "easyclient:cache_version";

/// Prefix applied to every stored key.
pub const CACHE_KEY_PREFIX: &str = "rq_cache:";

/// Prefix reserved for entry tags.
pub const CACHE_TAG_PREFIX: &str = "rq_cache:";

/// Fixed namespacing options injected into every backend regardless of
/// kind. Values are serialized as JSON, the crate's native format.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub key_prefix: String,
    pub tag_prefix: String,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            key_prefix: CACHE_KEY_PREFIX.to_string(),
            tag_prefix: CACHE_TAG_PREFIX.to_string(),
        }
    }
}

impl CacheOptions {
    /// The storage key for a logical key.
    pub(crate) fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

/// Key-value store capability used for response memoization.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Load the value stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, value: &Value, key: &str) -> Result<()>;

    /// Remove every entry this backend owns.
    async fn flush(&self) -> Result<()>;
}

/// Closed set of cache backend kinds.
///
/// SQL variants take a live connection pool; the backend owns its table
/// (created on attachment) but not the connection.
#[derive(Debug)]
pub enum CacheConfig {
    /// JSON store file under the given directory.
    File { path: PathBuf },
    Sqlite(SqlitePool),
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl CacheConfig {
    /// Construct the backend for this configuration.
    ///
    /// Construction failures (unwritable directory, unreachable database)
    /// propagate to the caller.
    pub(crate) async fn build(self) -> Result<Arc<dyn CacheBackend>> {
        let options = CacheOptions::default();
        Ok(match self {
            Self::File { path } => Arc::new(FileCache::open(path, options)?),
            Self::Sqlite(pool) => Arc::new(SqliteCache::new(pool, options).await?),
            Self::Postgres(pool) => Arc::new(PostgresCache::new(pool, options).await?),
            Self::MySql(pool) => Arc::new(MySqlCache::new(pool, options).await?),
        })
    }
}
