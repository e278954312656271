use crate::config::StoreFailurePolicy;
use crate::errors::{AppError, Result};
use crate::limiter::decision::Decision;
use crate::observability::MetricsRecorder;

/// Resolve an admission result under the deployment's store failure policy
///
/// Only `StoreUnavailable` is subject to the policy; caller errors always
/// propagate. A fail-closed rejection asks the client to retry after one
/// full window.
pub fn apply_failure_policy(
    policy: StoreFailurePolicy,
    result: Result<Decision>,
    limit: u64,
    window_seconds: u64,
) -> Result<Decision> {
    match result {
        Err(AppError::StoreUnavailable(reason)) => {
            MetricsRecorder::record_fallback(policy.as_str());
            match policy {
                StoreFailurePolicy::Propagate => Err(AppError::StoreUnavailable(reason)),
                StoreFailurePolicy::FailOpen => {
                    tracing::warn!(%reason, "Counter store unavailable, admitting request");
                    Ok(Decision::admit_unchecked(limit))
                }
                StoreFailurePolicy::FailClosed => {
                    tracing::warn!(%reason, "Counter store unavailable, rejecting request");
                    Ok(Decision::reject(limit, window_seconds))
                }
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> Result<Decision> {
        Err(AppError::StoreUnavailable("connection reset".to_string()))
    }

    #[test]
    fn test_propagate_keeps_error() {
        let result = apply_failure_policy(StoreFailurePolicy::Propagate, unavailable(), 5, 60);
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[test]
    fn test_fail_open_admits() {
        let decision =
            apply_failure_policy(StoreFailurePolicy::FailOpen, unavailable(), 5, 60).unwrap();
        assert!(decision.allowed);
        assert!(decision.bypassed);
        assert!(decision.fallback);
    }

    #[test]
    fn test_fail_closed_rejects_with_window_hint() {
        let decision =
            apply_failure_policy(StoreFailurePolicy::FailClosed, unavailable(), 5, 60).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_seconds, Some(60));
        assert_eq!(decision.outcome(), "rejected");
        assert!(!decision.bypassed);
        assert!(decision.fallback);
    }

    #[test]
    fn test_caller_errors_bypass_policy() {
        let result = apply_failure_policy(
            StoreFailurePolicy::FailOpen,
            Err(AppError::InvalidIdentifier),
            5,
            60,
        );
        assert!(matches!(result, Err(AppError::InvalidIdentifier)));
    }

    #[test]
    fn test_decisions_pass_through() {
        let denied = Decision::reject(5, 10);
        let result =
            apply_failure_policy(StoreFailurePolicy::FailOpen, Ok(denied.clone()), 5, 60).unwrap();
        assert_eq!(result, denied);
    }
}
