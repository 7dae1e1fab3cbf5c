//! Store connection settings.

use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Connection settings for the Redis store.
///
/// Host and port carry no defaults: a missing value is a configuration
/// error, not a silent fallback to localhost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Server host name or address.
    #[serde(default)]
    pub host: Option<String>,

    /// Server port.
    #[serde(default)]
    pub port: Option<u16>,

    /// Logical database index.
    #[serde(default)]
    pub db: i64,

    /// ACL user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (or ACL password).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout on the socket in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            db: 0,
            username: None,
            password: None,
            connect_timeout_ms: default_timeout_ms(),
            io_timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Settings for `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Build the connection target, rejecting incomplete settings.
    ///
    /// Credentials are passed as-is, so passwords may contain any character.
    pub fn connection_info(&self) -> Result<ConnectionInfo, CacheError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CacheError::NotConfigured("store host is not set".to_string()))?;
        let port = self
            .port
            .filter(|p| *p != 0)
            .ok_or_else(|| CacheError::NotConfigured("store port is not set".to_string()))?;

        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: self.username.clone(),
                password: self.password.clone(),
                ..RedisConnectionInfo::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_requires_host_and_port() {
        let missing_host = StoreConfig {
            port: Some(6379),
            ..StoreConfig::default()
        };
        assert!(matches!(
            missing_host.connection_info(),
            Err(CacheError::NotConfigured(_))
        ));

        let missing_port = StoreConfig {
            host: Some("localhost".to_string()),
            ..StoreConfig::default()
        };
        assert!(matches!(
            missing_port.connection_info(),
            Err(CacheError::NotConfigured(_))
        ));

        let blank_host = StoreConfig {
            host: Some("  ".to_string()),
            port: Some(6379),
            ..StoreConfig::default()
        };
        assert!(blank_host.connection_info().is_err());
    }

    #[test]
    fn test_connection_info_carries_db_and_credentials() {
        let mut config = StoreConfig::new(" cache.internal ", 6380);
        config.db = 2;
        let info = config.connection_info().unwrap();
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6380) if host == "cache.internal"));
        assert_eq!(info.redis.db, 2);
        assert!(info.redis.username.is_none());
        assert!(info.redis.password.is_none());

        config.username = Some("shop".to_string());
        config.password = Some("secret".to_string());
        let info = config.connection_info().unwrap();
        assert_eq!(info.redis.username.as_deref(), Some("shop"));
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_password_with_url_characters_is_kept_verbatim() {
        let mut config = StoreConfig::new("cache.internal", 6379);
        config.username = Some("us:er@x".to_string());
        config.password = Some("p@ss/w#rd:?%20".to_string());

        let info = config.connection_info().unwrap();
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6379) if host == "cache.internal"));
        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.username.as_deref(), Some("us:er@x"));
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/w#rd:?%20"));
    }

    #[test]
    fn test_default_timeouts_are_one_second() {
        let config: StoreConfig = serde_json::from_str(r#"{"host": "h", "port": 1}"#).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.io_timeout(), Duration::from_secs(1));
    }
}
