//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use turbo_cache::{ProtectedKeys, StoreConfig};
use turbo_stock::{InvalidationConfig, SyncOptions};

/// Contents of `stock.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockConfig {
    /// Redis connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Cache flush settings.
    #[serde(default)]
    pub flush: FlushConfig,

    /// Reconciliation and rebuild settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Authoritative stock source.
    #[serde(default)]
    pub source: SourceConfig,

    /// CDN cache invalidation.
    #[serde(default)]
    pub invalidation: InvalidationConfig,
}

impl StockConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().map_or(false, |e| e == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Apply command-line / environment overrides of the store address.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.store.host = Some(host);
        }
        if let Some(port) = port {
            self.store.port = Some(port);
        }
    }
}

/// `[flush]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushConfig {
    /// Key prefixes a flush never deletes.
    #[serde(default)]
    pub protected_prefixes: ProtectedKeys,

    /// Keys examined per scan step.
    #[serde(default = "default_batch")]
    pub batch_size: usize,
}

fn default_batch() -> usize {
    100
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: ProtectedKeys::default(),
            batch_size: default_batch(),
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_batch")]
    pub scan_batch: usize,

    /// Ops per pipelined batch during a rebuild.
    #[serde(default = "default_write_batch")]
    pub write_batch: usize,

    /// Seconds between passes of `watch`.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_write_batch() -> usize {
    500
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_batch: default_batch(),
            write_batch: default_write_batch(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            scan_batch: self.scan_batch,
            write_batch: self.write_batch,
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Catalog snapshot exported from the ERP, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Generate a default stock.toml config file.
pub fn generate_default_config() -> String {
    r#"# Stock cache configuration

[store]
host = "127.0.0.1"
port = 6379
db = 0
# username = "default"
# password = "secret"
connect_timeout_ms = 1000
io_timeout_ms = 1000

[flush]
# Keys starting with these prefixes survive `turbo-stock flush`.
protected_prefixes = [
    "cart:",
    "session:",
    "stock:",
    "product-stock-",
    "product-stock-is-dirty-",
    "product-template-stock-",
]
batch_size = 100

[sync]
scan_batch = 100
write_batch = 500
interval_secs = 60

[source]
path = "catalog.json"

[invalidation]
enabled = false
# url = "https://cdn.example.com/cache-invalidate"
# key = "generate with `turbo-stock invalidation-key`"
timeout_ms = 5000
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let config: StockConfig = toml::from_str(&generate_default_config()).unwrap();

        assert_eq!(config.store.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.store.port, Some(6379));
        assert!(config.flush.protected_prefixes.is_protected("cart:1"));
        assert_eq!(config.sync.write_batch, 500);
        assert_eq!(config.source.path, Some(PathBuf::from("catalog.json")));
        assert!(!config.invalidation.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults_without_store_address() {
        let config: StockConfig = toml::from_str("").unwrap();

        assert_eq!(config, StockConfig::default());
        assert!(config.store.host.is_none());
        assert_eq!(config.flush.batch_size, 100);
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.invalidation.timeout_ms, 5000);
    }

    #[test]
    fn test_protected_patterns_accept_globs() {
        let config: StockConfig = toml::from_str(
            r#"
            [flush]
            protected_prefixes = ["cart:*", "wishlist:"]
            "#,
        )
        .unwrap();

        let protected = &config.flush.protected_prefixes;
        assert!(protected.is_protected("cart:9"));
        assert!(protected.is_protected("wishlist:1"));
        assert!(!protected.is_protected("product-stock-1"));
    }

    #[test]
    fn test_overrides_replace_store_address() {
        let mut config = StockConfig::default();
        config.apply_overrides(Some("redis.internal".to_string()), Some(6380));
        assert_eq!(config.store.host.as_deref(), Some("redis.internal"));
        assert_eq!(config.store.port, Some(6380));

        config.apply_overrides(None, None);
        assert_eq!(config.store.port, Some(6380));
    }

    #[test]
    fn test_json_config_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock.json");
        std::fs::write(&path, r#"{"store": {"host": "h", "port": 1}}"#).unwrap();

        let config = StockConfig::load(&path).unwrap();
        assert_eq!(config.store.host.as_deref(), Some("h"));
    }
}
