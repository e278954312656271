// Counter windows in Redis, updated through a Lua script so that window
// creation and increment happen in one server-side step.

use super::{CounterRecord, CounterStore};
use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use std::time::Duration;

// SET NX only succeeds for the first writer of a window, so the expiry is
// fixed at creation and never pushed back by later increments.
static INCREMENT_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local amount = tonumber(ARGV[1])
        local ttl_ms = tonumber(ARGV[2])

        local created = redis.call('SET', key, 0, 'PX', ttl_ms, 'NX')
        local current = redis.call('INCRBY', key, amount)
        local pttl = redis.call('PTTL', key)

        -- Counter left without expiry by an outside writer
        if pttl < 0 then
            redis.call('PEXPIRE', key, ttl_ms)
            pttl = ttl_ms
        end

        if created then
            return {current, pttl, 1}
        end
        return {current, pttl, 0}
        "#,
    )
});

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Open a client and wait for the first connection
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        tracing::info!("Creating Redis client");

        let client = Client::open(config.url.as_str())?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            AppError::StoreUnavailable(format!(
                "Redis connection timed out after {}s",
                config.connection_timeout_seconds
            ))
        })??;

        tracing::info!("Redis client connected");

        Ok(Self::new(manager))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_with_ttl(
        &self,
        key: &str,
        amount: i64,
        ttl: Duration,
    ) -> Result<CounterRecord> {
        let mut manager = self.manager.clone();
        let ttl_ms = u64::try_from(ttl.as_millis().max(1)).map_err(|_| {
            AppError::Configuration(format!("Window of {:?} is out of range", ttl))
        })?;

        let (count, pttl, created): (i64, i64, i64) = INCREMENT_SCRIPT
            .key(key)
            .arg(amount)
            .arg(ttl_ms)
            .invoke_async(&mut manager)
            .await?;

        tracing::trace!(key = %key, count, pttl, "Counter incremented");

        Ok(CounterRecord {
            count,
            ttl_remaining: Duration::from_millis(pttl.max(0) as u64),
            created: created == 1,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<CounterRecord>> {
        let mut manager = self.manager.clone();

        let (count, pttl): (Option<i64>, i64) = redis::pipe()
            .atomic()
            .get(key)
            .pttl(key)
            .query_async(&mut manager)
            .await?;

        Ok(count.map(|count| CounterRecord {
            count,
            ttl_remaining: Duration::from_millis(pttl.max(0) as u64),
            created: false,
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut manager = self.manager.clone();
        let removed: i64 = manager.del(key).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut manager = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
