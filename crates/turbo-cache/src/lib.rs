//! Key-Value store layer for TurboCommerce stock caching.
//!
//! Wraps the external key-value store behind the [`KvStore`] contract used
//! by the stock cache: raw and JSON get/set, delete, cursor scans, and
//! atomic pipelined [`WriteBatch`]es, optionally guarded by watched keys.
//! Two backends are provided:
//! [`RedisStore`] for production and [`MemoryStore`] for development and
//! tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::prelude::*;
//!
//! let mut store = RedisStore::connect(&StoreConfig::new("localhost", 6379))?;
//!
//! // Store a value
//! store.set_json("cart:user123", &cart)?;
//!
//! // Write several keys atomically
//! let mut batch = WriteBatch::new();
//! batch.set("product-stock-7", r#"{"1":4.0}"#).delete("product-stock-is-dirty-7");
//! store.execute(&batch)?;
//!
//! // Purge everything except carts, sessions, and stock state
//! flush_except_protected(&mut store, &ProtectedKeys::default(), 100)?;
//! ```

mod config;
mod error;
mod flush;
mod kv;
mod memory;
mod protected;
mod redis_store;

pub use config::StoreConfig;
pub use error::CacheError;
pub use flush::{flush_except_protected, FlushReport};
pub use kv::{KvStore, WriteBatch, WriteOp};
pub use memory::{glob_match, MemoryStats, MemoryStore};
pub use protected::{ProtectedKeys, DEFAULT_PROTECTED_PREFIXES};
pub use redis_store::RedisStore;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        flush_except_protected, CacheError, FlushReport, KvStore, MemoryStore, ProtectedKeys,
        RedisStore, StoreConfig, WriteBatch,
    };
}
