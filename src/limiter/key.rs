use crate::errors::{AppError, Result};
use std::fmt;

/// Store key for one caller within one limiter keyspace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    prefix: String,
    identifier: String,
}

impl RateLimitKey {
    /// Derive the key for `identifier` under `prefix`
    ///
    /// An empty or blank identifier is a caller error and never reaches the store.
    pub fn derive(prefix: &str, identifier: &str) -> Result<Self> {
        if identifier.trim().is_empty() {
            return Err(AppError::InvalidIdentifier);
        }

        Ok(Self {
            prefix: prefix.to_string(),
            identifier: identifier.to_string(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn as_store_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_store_key_format() {
        let key = assert_ok!(RateLimitKey::derive("fs-starter:rl:api:global", "1.2.3.4"));
        assert_eq!(key.as_store_key(), "fs-starter:rl:api:global:1.2.3.4");
        assert_eq!(key.identifier(), "1.2.3.4");
    }

    #[test]
    fn test_derivation_is_stable() {
        let a = RateLimitKey::derive("rl", "::1").unwrap();
        let b = RateLimitKey::derive("rl", "::1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_store_key(), b.as_store_key());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert_err!(RateLimitKey::derive("rl", "\t"));
        assert!(matches!(
            RateLimitKey::derive("rl", ""),
            Err(AppError::InvalidIdentifier)
        ));
        assert!(matches!(
            RateLimitKey::derive("rl", "   "),
            Err(AppError::InvalidIdentifier)
        ));
    }
}
