//! ==============================================================================
//! store.rs - measurement history
//! ==============================================================================
//!
//! purpose:
//!     owns the persisted, time-ordered series of readings for one sensor.
//!     the series is a list with the newest reading at the head: append is a
//!     push to the head, `recent(n)` reads the first n entries.
//!
//! relationships:
//!     - written by: sampler.rs (sole writer)
//!     - read by: query.rs
//!     - backends: RedisBackend (deadpool-redis), MemoryBackend (in-process)
//!
//! record format:
//!     one json object per list entry, see domain::Reading. unknown fields
//!     are ignored and missing pollutant fields decode as None, so records
//!     written by older or newer builds stay readable.
//!
//! retention:
//!     reads are always bounded by n. the list itself is only trimmed when
//!     `max_entries` is configured.
//!
//! ==============================================================================

use crate::config::StorageConfig;
use crate::domain::Reading;
use crate::error::{CoreError, Result};

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// list-shaped storage addressed by key, newest entry at index 0
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// push one encoded record to the head of the list
    async fn push_front(&self, key: &str, value: String) -> Result<()>;

    /// up to `n` entries from the head
    async fn range(&self, key: &str, n: usize) -> Result<Vec<String>>;

    /// keep only the first `len` entries
    async fn trim(&self, key: &str, len: usize) -> Result<()>;
}

// ==============================================================================
// redis backend
// ==============================================================================

#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// build the pool; connections are opened lazily on first use
    pub fn new(url: &str, pool_size: usize) -> Result<Self> {
        let pool = Config::from_url(url)
            .builder()
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?
            .max_size(pool_size.max(1))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))
    }
}

#[async_trait]
impl ListBackend for RedisBackend {
    async fn push_front(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .lpush(key, value)
            .await
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn range(&self, key: &str, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let stop = isize::try_from(n - 1).unwrap_or(isize::MAX);
        let values: Vec<String> = conn
            .lrange(key, 0, stop)
            .await
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        Ok(values)
    }

    async fn trim(&self, key: &str, len: usize) -> Result<()> {
        let mut conn = self.conn().await?;
        // LTRIM key 0 -1 would keep everything
        if len == 0 {
            let _: () = conn
                .del(key)
                .await
                .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
            return Ok(());
        }
        let stop = isize::try_from(len - 1).unwrap_or(isize::MAX);
        let _: () = conn
            .ltrim(key, 0, stop)
            .await
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}

// ==============================================================================
// in-memory backend
// ==============================================================================

/// process-local list store for development without redis, and for tests
#[derive(Default)]
pub struct MemoryBackend {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self, key: &str) -> usize {
        self.lists.read().await.get(key).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl ListBackend for MemoryBackend {
    async fn push_front(&self, key: &str, value: String) -> Result<()> {
        self.lists
            .write()
            .await
            .entry(key.to_owned())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn range(&self, key: &str, n: usize) -> Result<Vec<String>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim(&self, key: &str, len: usize) -> Result<()> {
        if let Some(list) = self.lists.write().await.get_mut(key) {
            list.truncate(len);
        }
        Ok(())
    }
}

// ==============================================================================
// measurement store
// ==============================================================================

#[derive(Clone)]
pub struct MeasurementStore {
    backend: Arc<dyn ListBackend>,
    key: String,
    max_entries: Option<usize>,
}

impl MeasurementStore {
    /// a cap of zero would empty the list on every append, so it means "no cap"
    pub fn new(backend: Arc<dyn ListBackend>, key: impl Into<String>, max_entries: Option<usize>) -> Self {
        Self {
            backend,
            key: key.into(),
            max_entries: max_entries.filter(|&max| max > 0),
        }
    }

    /// build the backend named in config
    pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        if config.max_entries == Some(0) {
            anyhow::bail!("storage.max_entries must be at least 1 (leave it unset to keep everything)");
        }

        let backend: Arc<dyn ListBackend> = match config.backend.as_str() {
            "redis" => {
                let redis = RedisBackend::new(&config.redis_url, config.pool_size)?;
                match redis.ping().await {
                    Ok(()) => tracing::info!(url = %config.redis_url, "Connected to redis"),
                    // not fatal: reads report StorageUnavailable until it comes back
                    Err(e) => tracing::warn!(url = %config.redis_url, error = %e, "Redis not reachable at startup"),
                }
                Arc::new(redis)
            }
            "memory" => {
                tracing::info!("Using in-memory history (lost on restart)");
                Arc::new(MemoryBackend::new())
            }
            other => anyhow::bail!("unknown storage backend: {}", other),
        };

        Ok(Self::new(backend, config.key.clone(), config.max_entries))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// write one reading as the newest entry
    ///
    /// succeeds once the push lands; a failed trim only delays retention
    /// until the next append.
    pub async fn append(&self, reading: &Reading) -> Result<()> {
        let record = serde_json::to_string(reading)?;
        self.backend.push_front(&self.key, record).await?;

        if let Some(max) = self.max_entries {
            if let Err(e) = self.backend.trim(&self.key, max).await {
                tracing::warn!(key = %self.key, max_entries = max, error = %e, "Trim failed, list over its cap until next append");
            }
        }
        Ok(())
    }

    /// up to `n` readings, most recent first
    pub async fn recent(&self, n: usize) -> Result<Vec<Reading>> {
        if n == 0 {
            return Err(CoreError::InvalidLength(n));
        }

        let records = self.backend.range(&self.key, n).await?;
        records
            .iter()
            .map(|record| serde_json::from_str(record).map_err(CoreError::from))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// memory backend that can be switched into an outage
    #[derive(Default)]
    pub struct FlakyBackend {
        pub inner: MemoryBackend,
        pub down: AtomicBool,
        /// only LTRIM fails, pushes and reads still work
        pub trim_fails: AtomicBool,
    }

    impl FlakyBackend {
        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(CoreError::StorageUnavailable("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ListBackend for FlakyBackend {
        async fn push_front(&self, key: &str, value: String) -> Result<()> {
            self.check()?;
            self.inner.push_front(key, value).await
        }

        async fn range(&self, key: &str, n: usize) -> Result<Vec<String>> {
            self.check()?;
            self.inner.range(key, n).await
        }

        async fn trim(&self, key: &str, len: usize) -> Result<()> {
            self.check()?;
            if self.trim_fails.load(Ordering::SeqCst) {
                return Err(CoreError::StorageUnavailable("ltrim failed".into()));
            }
            self.inner.trim(key, len).await
        }
    }
}
