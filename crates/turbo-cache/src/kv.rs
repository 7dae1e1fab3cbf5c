//! Key-Value store contract with automatic serialization.

use crate::CacheError;
use serde::{de::DeserializeOwned, Serialize};

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Overwrite the whole value of a key.
    Set { key: String, value: String },
    /// Remove a key.
    Delete { key: String },
}

impl WriteOp {
    /// Key touched by this write.
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// Writes sent to the store as one pipelined, atomic unit.
///
/// Either every op is applied or none is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a SET.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a SET of a JSON-encoded value.
    pub fn set_json<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, CacheError> {
        let encoded = serde_json::to_string(value)?;
        Ok(self.set(key, encoded))
    }

    /// Queue a DEL.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    /// Queued ops in order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Contract of the external key-value store.
///
/// Every call is a synchronous network round trip and the only place a
/// caller blocks.
pub trait KvStore {
    /// Check that the store is reachable.
    fn ping(&mut self) -> Result<(), CacheError>;

    /// Get a raw value. Returns `None` if the key doesn't exist.
    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a raw value, overwriting any previous one.
    fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Delete keys, returning how many existed.
    fn delete(&mut self, keys: &[String]) -> Result<u64, CacheError>;

    /// One step of a cursor scan over keys matching a glob `pattern`.
    ///
    /// Start with cursor `0`; iteration is complete when the returned cursor
    /// is `0` again. `count` bounds the work done per step.
    fn scan(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    /// Apply a batch atomically (MULTI/EXEC pipeline).
    fn execute(&mut self, batch: &WriteBatch) -> Result<(), CacheError>;

    /// Start watching `keys` for the next [`execute_watched`](Self::execute_watched).
    fn watch(&mut self, keys: &[String]) -> Result<(), CacheError>;

    /// Forget every watched key without writing anything.
    fn unwatch(&mut self) -> Result<(), CacheError>;

    /// Apply a batch only if no watched key changed since [`watch`](Self::watch).
    ///
    /// Returns `false` when the batch was discarded. The watch is released
    /// either way.
    fn execute_watched(&mut self, batch: &WriteBatch) -> Result<bool, CacheError>;

    /// Get and deserialize a JSON value.
    fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, CacheError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and set a JSON value.
    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), CacheError>
    where
        Self: Sized,
    {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded)
    }

    /// Run a full cursor scan, handing each bounded batch of keys to `f`.
    ///
    /// Keys may be reported more than once; callers must be idempotent.
    fn scan_each<F>(&mut self, pattern: &str, count: usize, mut f: F) -> Result<(), CacheError>
    where
        Self: Sized,
        F: FnMut(&mut Self, Vec<String>) -> Result<(), CacheError>,
    {
        let mut cursor = 0;
        loop {
            let (next, keys) = self.scan(cursor, pattern, count)?;
            if !keys.is_empty() {
                f(self, keys)?;
            }
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn ping(&mut self) -> Result<(), CacheError> {
        (**self).ping()
    }

    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).set(key, value)
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, CacheError> {
        (**self).delete(keys)
    }

    fn scan(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        (**self).scan(cursor, pattern, count)
    }

    fn execute(&mut self, batch: &WriteBatch) -> Result<(), CacheError> {
        (**self).execute(batch)
    }

    fn watch(&mut self, keys: &[String]) -> Result<(), CacheError> {
        (**self).watch(keys)
    }

    fn unwatch(&mut self) -> Result<(), CacheError> {
        (**self).unwatch()
    }

    fn execute_watched(&mut self, batch: &WriteBatch) -> Result<bool, CacheError> {
        (**self).execute_watched(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_batch_builder_keeps_order() {
        let mut batch = WriteBatch::new();
        batch.set("a", "1").delete("b").set("c", "3");

        let keys: Vec<&str> = batch.ops().iter().map(WriteOp::key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_json_roundtrip_through_store() {
        let mut store = MemoryStore::new();
        store.set_json("cart:1", &vec![1, 2, 3]).unwrap();

        let value: Option<Vec<i32>> = store.get_json("cart:1").unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = store.get_json("cart:2").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_scan_each_visits_every_key_in_small_batches() {
        let mut store = MemoryStore::new();
        for i in 0..25 {
            store.set(&format!("k:{}", i), "v").unwrap();
        }

        let mut seen = Vec::new();
        let mut batches = 0;
        store
            .scan_each("k:*", 4, |_, keys| {
                assert!(keys.len() <= 4);
                batches += 1;
                seen.extend(keys);
                Ok(())
            })
            .unwrap();

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
        assert!(batches >= 7);
    }
}
