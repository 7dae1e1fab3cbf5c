//! In-process store for development and tests.
//!
//! Behaves like the Redis backend (atomic batches, cursor scans that survive
//! concurrent deletes) and can be told to fail on demand.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::kv::{KvStore, WriteBatch, WriteOp};
use crate::CacheError;

/// Counters of the writes a [`MemoryStore`] has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Successful `set` calls plus SET ops inside batches.
    pub sets: u64,
    /// Keys removed by `delete` calls or DEL ops inside batches.
    pub deletes: u64,
    /// Successful `execute` calls.
    pub batches: u64,
}

/// In-memory [`KvStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: BTreeMap<String, String>,
    cursors: HashMap<u64, String>,
    next_cursor: u64,
    offline: bool,
    fail_batches: bool,
    fail_deletes: bool,
    stats: MemoryStats,
    revision: u64,
    revisions: HashMap<String, u64>,
    watched: Option<Vec<(String, Option<u64>)>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the server were unreachable.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Make `execute` fail without applying anything.
    pub fn fail_batches(&mut self, fail: bool) {
        self.fail_batches = fail;
    }

    /// Make `delete` fail without removing anything.
    pub fn fail_deletes(&mut self, fail: bool) {
        self.fail_deletes = fail;
    }

    /// Read a key without going through the fault checks.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// All keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    fn touch(&mut self, key: &str) {
        self.revision += 1;
        self.revisions.insert(key.to_string(), self.revision);
    }

    fn apply(&mut self, batch: &WriteBatch) {
        for op in batch.ops() {
            match op {
                WriteOp::Set { key, value } => {
                    self.data.insert(key.clone(), value.clone());
                    self.touch(key);
                    self.stats.sets += 1;
                }
                WriteOp::Delete { key } => {
                    if self.data.remove(key).is_some() {
                        self.touch(key);
                        self.stats.deletes += 1;
                    }
                }
            }
        }
        self.stats.batches += 1;
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.offline {
            return Err(CacheError::Connection("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn ping(&mut self) -> Result<(), CacheError> {
        self.check_online()
    }

    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check_online()?;
        self.data.insert(key.to_string(), value.to_string());
        self.touch(key);
        self.stats.sets += 1;
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<u64, CacheError> {
        self.check_online()?;
        if self.fail_deletes {
            return Err(CacheError::StoreError("DEL rejected".to_string()));
        }
        let mut removed = 0;
        for key in keys {
            if self.data.remove(key.as_str()).is_some() {
                self.touch(key);
                removed += 1;
            }
        }
        self.stats.deletes += removed;
        Ok(removed)
    }

    fn scan(
        &mut self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        self.check_online()?;

        let start = match cursor {
            0 => Bound::Unbounded,
            id => match self.cursors.remove(&id) {
                Some(last) => Bound::Excluded(last),
                None => return Err(CacheError::StoreError(format!("unknown cursor {}", id))),
            },
        };

        let examined: Vec<String> = self
            .data
            .range::<String, _>((start, Bound::Unbounded))
            .take(count.max(1))
            .map(|(key, _)| key.clone())
            .collect();

        let more = examined.last().map_or(false, |last| {
            self.data
                .range::<String, _>((Bound::Excluded(last.clone()), Bound::Unbounded))
                .next()
                .is_some()
        });

        let next = match examined.last() {
            Some(last) if more => {
                let id = self.next_cursor.max(1);
                self.next_cursor = id + 1;
                self.cursors.insert(id, last.clone());
                id
            }
            _ => 0,
        };

        let matched = examined
            .into_iter()
            .filter(|key| glob_match(pattern, key))
            .collect();
        Ok((next, matched))
    }

    fn execute(&mut self, batch: &WriteBatch) -> Result<(), CacheError> {
        self.check_online()?;
        if self.fail_batches {
            return Err(CacheError::StoreError("EXECABORT transaction discarded".to_string()));
        }
        self.apply(batch);
        Ok(())
    }

    fn watch(&mut self, keys: &[String]) -> Result<(), CacheError> {
        self.check_online()?;
        let mut watched = self.watched.take().unwrap_or_default();
        for key in keys {
            watched.push((key.clone(), self.revisions.get(key).copied()));
        }
        self.watched = Some(watched);
        Ok(())
    }

    fn unwatch(&mut self) -> Result<(), CacheError> {
        self.check_online()?;
        self.watched = None;
        Ok(())
    }

    fn execute_watched(&mut self, batch: &WriteBatch) -> Result<bool, CacheError> {
        self.check_online()?;
        let watched = self.watched.take().ok_or_else(|| {
            CacheError::Connection("watched keys were lost with the connection".to_string())
        })?;
        if self.fail_batches {
            return Err(CacheError::StoreError("EXECABORT transaction discarded".to_string()));
        }
        let changed = watched
            .iter()
            .any(|(key, seen)| self.revisions.get(key).copied() != *seen);
        if changed {
            return Ok(false);
        }
        self.apply(batch);
        Ok(true)
    }
}

/// Redis-style glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
