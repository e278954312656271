pub mod admission;
pub mod decision;
pub mod fallback;
pub mod key;

pub use admission::{AdmissionCounter, AdmissionSettings, MAX_POINTS};
pub use decision::Decision;
pub use fallback::apply_failure_policy;
pub use key::RateLimitKey;
