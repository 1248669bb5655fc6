use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{Result, WeatherChatError};

#[cfg(test)]
use mockall::automock;

/// Opaque string blobs under string keys.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Replace the whole value stored under `key`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Redis-backed store over a deadpool connection pool
#[derive(Clone)]
pub struct RedisKv {
    pool: Arc<Pool>,
}

impl RedisKv {
    /// Create a pool from configuration and check the server answers PING
    pub async fn new_with_config(config: &Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);
        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_timeout()),
                recycle: Some(config.get_pool_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| WeatherChatError::Kv(format!("pool creation failed: {e}")))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        // SET swaps the whole blob in one command.
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

/// Process-local store, used when Redis is disabled or unreachable.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Redis when enabled and reachable, otherwise the in-memory store.
pub async fn store_from_config(config: &Config) -> Arc<dyn KvStore> {
    if !config.redis.enabled {
        tracing::info!("Redis disabled - query history kept in memory");
        return Arc::new(MemoryKv::new());
    }

    match RedisKv::new_with_config(config).await {
        Ok(redis) => Arc::new(redis),
        Err(e) => {
            tracing::warn!("Redis unavailable ({}) - query history kept in memory", e);
            Arc::new(MemoryKv::new())
        }
    }
}
