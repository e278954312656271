pub mod memory;
pub mod redis;

pub use self::memory::InMemoryCounterStore;
pub use self::redis::RedisCounterStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// State of one counter window as seen right after a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRecord {
    /// Points consumed in the active window
    pub count: i64,
    /// Time left until the window expires
    pub ttl_remaining: Duration,
    /// Whether this operation created the window
    pub created: bool,
}

/// Shared key-value store holding per-key counters
///
/// Implementations must make `increment_with_ttl` linearizable per key: the
/// window is created at most once, and its expiry is set only on creation.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `amount` to the counter at `key`, creating it with `ttl` if absent
    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration)
        -> Result<CounterRecord>;

    /// Read the counter without modifying it
    async fn fetch(&self, key: &str) -> Result<Option<CounterRecord>>;

    /// Remove the counter, returning whether one existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Build the configured counter store
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>> {
    match config.backend {
        StoreBackend::Redis => {
            let store = RedisCounterStore::connect(&config.redis).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory counter store; limits are not shared between instances");
            let store = InMemoryCounterStore::new();
            store.spawn_purge_task(Duration::from_secs(config.memory_purge_interval_seconds));
            Ok(Arc::new(store))
        }
    }
}
