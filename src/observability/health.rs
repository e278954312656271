use crate::store::CounterStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub store: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: String,
    pub backend: String,
    pub message: Option<String>,
}

pub struct HealthChecker {
    store: Arc<dyn CounterStore>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Liveness check - is the service running?
    pub async fn liveness(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                store: ComponentStatus {
                    status: "unknown".to_string(),
                    backend: self.store.backend_name().to_string(),
                    message: None,
                },
            },
        }
    }

    /// Readiness check - can the service answer admission checks?
    pub async fn readiness(&self) -> HealthStatus {
        let store_status = self.check_store().await;

        let overall_status = if store_status.status == "ok" {
            "ok"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                store: store_status,
            },
        }
    }

    async fn check_store(&self) -> ComponentStatus {
        let backend = self.store.backend_name().to_string();
        match self.store.ping().await {
            Ok(_) => ComponentStatus {
                status: "ok".to_string(),
                backend,
                message: None,
            },
            Err(e) => ComponentStatus {
                status: "error".to_string(),
                backend,
                message: Some(format!("Store check failed: {}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCounterStore;

    #[tokio::test]
    async fn test_readiness_with_memory_store() {
        let checker = HealthChecker::new(Arc::new(InMemoryCounterStore::new()));

        let status = checker.readiness().await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.checks.store.backend, "memory");

        let status = checker.liveness().await;
        assert_eq!(status.checks.store.status, "unknown");
    }
}
