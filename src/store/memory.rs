// Single-process counter store. Windows are shared by every caller holding
// the same store, not by separate processes.

use super::{CounterRecord, CounterStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: i64,
    expires_at: Instant,
}

impl Window {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    fn record(&self, now: Instant, created: bool) -> CounterRecord {
        CounterRecord {
            count: self.count,
            ttl_remaining: self.expires_at.saturating_duration_since(now),
            created,
        }
    }
}

/// In-memory counter store for development and tests
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired windows, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| window.is_live(now));
        before - windows.len()
    }

    /// Number of windows held, expired ones included
    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Periodically purge expired windows for as long as the runtime lives
    pub fn spawn_purge_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired counter windows");
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_with_ttl(
        &self,
        key: &str,
        amount: i64,
        ttl: Duration,
    ) -> Result<CounterRecord> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if let Some(window) = windows.get_mut(key).filter(|window| window.is_live(now)) {
            window.count = window
                .count
                .checked_add(amount)
                .ok_or(AppError::CounterOverflow)?;
            return Ok(window.record(now, false));
        }

        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            AppError::Configuration(format!("Window of {:?} is out of range", ttl))
        })?;
        let window = Window {
            count: amount,
            expires_at,
        };
        windows.insert(key.to_string(), window);
        Ok(window.record(now, true))
    }

    async fn fetch(&self, key: &str) -> Result<Option<CounterRecord>> {
        let now = Instant::now();
        let windows = self.windows.lock().await;

        Ok(windows
            .get(key)
            .filter(|window| window.is_live(now))
            .map(|window| window.record(now, false)))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        Ok(windows
            .remove(key)
            .map(|window| window.is_live(now))
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
