use crate::store::CounterRecord;
use serde::Serialize;

/// Outcome of an admission check
///
/// A denied decision is a normal value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Maximum points per window
    pub limit: u64,
    /// Points consumed in the current window
    pub consumed: u64,
    /// Points left in the current window
    pub remaining: u64,
    /// Whole seconds to wait before retrying, only set when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    /// Milliseconds until the current window resets
    pub reset_after_ms: u64,
    /// Whether this call opened the window
    pub is_first_in_window: bool,
    /// Whether the decision skipped counting altogether
    pub bypassed: bool,
    /// Whether the decision was made without an answer from the counter store
    pub fallback: bool,
}

impl Decision {
    /// Evaluate a counter record against the window limit
    pub fn evaluate(record: &CounterRecord, limit: u64) -> Self {
        let consumed = record.count.max(0) as u64;
        let allowed = consumed <= limit;
        let reset_after_ms = record.ttl_remaining.as_millis() as u64;

        Self {
            allowed,
            limit,
            consumed,
            remaining: limit.saturating_sub(consumed),
            retry_after_seconds: (!allowed).then(|| retry_after_seconds(reset_after_ms)),
            reset_after_ms,
            is_first_in_window: record.created,
            bypassed: false,
            fallback: false,
        }
    }

    /// Decision for a limiter that is not enforcing
    pub fn bypass(limit: u64) -> Self {
        Self {
            allowed: true,
            limit,
            consumed: 0,
            remaining: limit,
            retry_after_seconds: None,
            reset_after_ms: 0,
            is_first_in_window: false,
            bypassed: true,
            fallback: false,
        }
    }

    /// Admission issued because the store could not be reached
    pub fn admit_unchecked(limit: u64) -> Self {
        Self {
            fallback: true,
            ..Self::bypass(limit)
        }
    }

    /// Rejection issued without consulting the store
    ///
    /// Nothing was counted, so `consumed` stays at zero.
    pub fn reject(limit: u64, retry_after_seconds: u64) -> Self {
        let retry_after_seconds = retry_after_seconds.max(1);
        Self {
            allowed: false,
            limit,
            consumed: 0,
            remaining: 0,
            retry_after_seconds: Some(retry_after_seconds),
            reset_after_ms: retry_after_seconds.saturating_mul(1000),
            is_first_in_window: false,
            bypassed: false,
            fallback: true,
        }
    }

    /// Whether the quota fields reflect a real counter window
    pub fn has_quota(&self) -> bool {
        !self.bypassed && !self.fallback
    }

    pub fn outcome(&self) -> &'static str {
        match (self.allowed, self.has_quota(), self.fallback) {
            (true, true, _) => "allowed",
            (true, false, _) => "bypassed",
            (false, _, true) => "rejected",
            (false, _, false) => "denied",
        }
    }
}

/// Round a window's remaining time up to whole seconds, never below one
pub fn retry_after_seconds(reset_after_ms: u64) -> u64 {
    ((reset_after_ms + 999) / 1000).max(1)
}
