use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::limiter::decision::Decision;
use crate::limiter::key::RateLimitKey;
use crate::observability::MetricsRecorder;
use crate::store::{CounterRecord, CounterStore};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Largest cost, penalty or reward a single call may carry
pub const MAX_POINTS: u64 = i64::MAX as u64;

/// Convert caller-supplied points into a counter delta
fn signed_points(points: u64) -> Result<i64> {
    if points == 0 {
        return Err(AppError::InvalidCost);
    }
    i64::try_from(points).map_err(|_| AppError::InvalidCost)
}

/// Parameters of one limiter instance, fixed at construction
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    /// Namespace for this limiter's keys in the shared store
    pub key_prefix: String,
    /// Points allowed per window
    pub points: u64,
    /// Window length
    pub window: Duration,
    /// Upper bound on a single store round trip
    pub store_timeout: Duration,
    /// When false every admission check is admitted without counting
    pub enforce: bool,
}

impl AdmissionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key_prefix: config.limiter.key_prefix.clone(),
            points: config.limiter.points,
            window: Duration::from_secs(config.limiter.duration_seconds),
            store_timeout: Duration::from_millis(config.limiter.store_timeout_ms),
            enforce: config.enforce(),
        }
    }
}

/// Admission control over a shared counter store
///
/// Holds no counting state of its own; every call is one round trip to the
/// store, so a single instance can be shared by all request handlers.
pub struct AdmissionCounter {
    store: Arc<dyn CounterStore>,
    settings: AdmissionSettings,
}

impl AdmissionCounter {
    /// Create a new admission counter
    pub fn new(store: Arc<dyn CounterStore>, settings: AdmissionSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &AdmissionSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Derive the store key for an identifier
    pub fn key_for(&self, identifier: &str) -> Result<RateLimitKey> {
        RateLimitKey::derive(&self.settings.key_prefix, identifier)
    }

    /// Consume `cost` points for `identifier` and decide whether to admit
    pub async fn admit(&self, identifier: &str, cost: u64) -> Result<Decision> {
        if !self.settings.enforce {
            MetricsRecorder::record_decision("bypassed");
            return Ok(Decision::bypass(self.settings.points));
        }

        let key = self.key_for(identifier)?;
        let amount = signed_points(cost)?;

        tracing::debug!(
            key = %key,
            cost = %cost,
            limit = %self.settings.points,
            "Checking admission"
        );

        let record = self.consume(&key, amount).await?;
        let decision = Decision::evaluate(&record, self.settings.points);

        if decision.allowed {
            tracing::debug!(
                key = %key,
                consumed = %decision.consumed,
                remaining = %decision.remaining,
                "Request admitted"
            );
        } else {
            tracing::warn!(
                identifier = %key.identifier(),
                limit = %decision.limit,
                consumed = %decision.consumed,
                retry_after = ?decision.retry_after_seconds,
                "Rate limit exceeded"
            );
        }
        MetricsRecorder::record_decision(decision.outcome());

        Ok(decision)
    }

    /// Current window for `identifier` without consuming points
    pub async fn get(&self, identifier: &str) -> Result<Option<Decision>> {
        let key = self.key_for(identifier)?;
        let store_key = key.as_store_key();

        let record = self
            .with_timeout("fetch", self.store.fetch(&store_key))
            .await?;

        Ok(record.map(|record| Decision::evaluate(&record, self.settings.points)))
    }

    /// Add points to the window without admitting anything
    pub async fn penalty(&self, identifier: &str, points: u64) -> Result<Decision> {
        let key = self.key_for(identifier)?;
        let record = self.consume(&key, signed_points(points)?).await?;

        tracing::info!(identifier = %key.identifier(), points, "Penalty applied");

        Ok(Decision::evaluate(&record, self.settings.points))
    }

    /// Give points back to the window
    pub async fn reward(&self, identifier: &str, points: u64) -> Result<Decision> {
        let key = self.key_for(identifier)?;
        let record = self.consume(&key, -signed_points(points)?).await?;

        tracing::info!(identifier = %key.identifier(), points, "Reward applied");

        Ok(Decision::evaluate(&record, self.settings.points))
    }

    /// Drop the window for `identifier`, returning whether one existed
    pub async fn delete(&self, identifier: &str) -> Result<bool> {
        let key = self.key_for(identifier)?;
        let store_key = key.as_store_key();

        let removed = self
            .with_timeout("delete", self.store.delete(&store_key))
            .await?;

        tracing::info!(key = %key, removed, "Rate limit window reset");

        Ok(removed)
    }

    async fn consume(&self, key: &RateLimitKey, amount: i64) -> Result<CounterRecord> {
        let store_key = key.as_store_key();
        self.with_timeout(
            "increment",
            self.store
                .increment_with_ttl(&store_key, amount, self.settings.window),
        )
        .await
    }

    /// Bound a store call by the configured timeout and record its outcome
    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable(format!(
                "{} timed out after {}ms",
                operation,
                self.settings.store_timeout.as_millis()
            ))),
        };

        MetricsRecorder::record_store_latency(operation, started.elapsed().as_secs_f64());

        match &result {
            Err(err @ AppError::StoreUnavailable(_)) => {
                tracing::error!(
                    backend = self.store.backend_name(),
                    operation,
                    kind = err.kind(),
                    error = %err,
                    "Counter store call failed"
                );
                MetricsRecorder::record_store_error(operation);
            }
            Err(err) => {
                tracing::warn!(operation, kind = err.kind(), "Counter store refused update");
            }
            Ok(_) => {}
        }

        result
    }
}
