//! Cache error types.

use thiserror::Error;

/// Errors that can occur when using the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Store host or port missing from configuration.
    #[error("Cache store is not configured: {0}")]
    NotConfigured(String),

    /// Connect or socket operation timed out.
    #[error("Timeout while talking to the cache store: {0}")]
    Timeout(String),

    /// Store rejected the configured credentials.
    #[error("Cache store authentication failed: {0}")]
    Authentication(String),

    /// Store unreachable (refused, reset, DNS).
    #[error("Unable to connect to the cache store: {0}")]
    Connection(String),

    /// Failed to serialize value.
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Failed to perform store operation.
    #[error("Store operation failed: {0}")]
    StoreError(String),
}

impl CacheError {
    /// Whether this error means the store could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            CacheError::Timeout(_) | CacheError::Authentication(_) | CacheError::Connection(_)
        )
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            CacheError::Timeout(e.to_string())
        } else if e.kind() == redis::ErrorKind::AuthenticationFailed {
            CacheError::Authentication(e.to_string())
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            CacheError::Connection(e.to_string())
        } else {
            CacheError::StoreError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(CacheError::Timeout("connect".into()).is_connectivity());
        assert!(CacheError::Authentication("bad password".into()).is_connectivity());
        assert!(CacheError::Connection("refused".into()).is_connectivity());
        assert!(!CacheError::NotConfigured("host".into()).is_connectivity());
        assert!(!CacheError::StoreError("WRONGTYPE".into()).is_connectivity());
    }

    #[test]
    fn test_redis_error_mapping() {
        let auth: redis::RedisError =
            (redis::ErrorKind::AuthenticationFailed, "invalid password").into();
        assert!(matches!(CacheError::from(auth), CacheError::Authentication(_)));

        let io: redis::RedisError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(CacheError::from(io), CacheError::Connection(_)));

        let timeout: redis::RedisError =
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out").into();
        assert!(matches!(CacheError::from(timeout), CacheError::Timeout(_)));

        let other: redis::RedisError = (redis::ErrorKind::TypeError, "wrong type").into();
        assert!(matches!(CacheError::from(other), CacheError::StoreError(_)));
    }
}
