//! Dirty marking of stale stock.
//!
//! Runs inline with the mutation that changed stock. Marking is best effort:
//! a store failure is logged and never reaches the caller, whose write has
//! already succeeded in the system of record.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use turbo_cache::{CacheError, KvStore, WriteBatch};

use crate::catalog::QuantWrite;
use crate::ids::VariantId;
use crate::keys;

/// Writes dirty markers for variants whose cached stock is stale.
pub struct DirtyMarker<S> {
    store: Option<S>,
}

impl<S: KvStore> DirtyMarker<S> {
    pub fn new(store: S) -> Self {
        Self { store: Some(store) }
    }

    /// A marker for deployments without a configured store. Every mark is
    /// logged and dropped.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Mark variants dirty in one pipelined batch, reporting failures.
    ///
    /// Each marker's value is the variant id. Re-marking an already dirty
    /// variant rewrites the same value.
    pub fn try_mark(&mut self, ids: &[VariantId]) -> Result<usize, CacheError> {
        let unique: BTreeSet<VariantId> = ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(0);
        }
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| CacheError::NotConfigured("dirty marking has no store".to_string()))?;

        let mut batch = WriteBatch::new();
        for id in &unique {
            batch.set(keys::dirty_key(*id), id.to_string());
        }
        store.execute(&batch)?;
        debug!(count = unique.len(), "marked variants dirty");
        Ok(unique.len())
    }

    /// Mark variants dirty; never fails.
    pub fn mark(&mut self, ids: &[VariantId]) {
        if let Err(e) = self.try_mark(ids) {
            warn!(error = %e, variants = ?ids, "dirty marking failed; stock cache may serve stale quantities");
        }
    }

    /// Apply the trigger policy to a set of stock writes and mark the
    /// affected variants; never fails.
    pub fn record(&mut self, writes: &[QuantWrite]) {
        let ids: Vec<VariantId> = writes
            .iter()
            .filter(|w| w.marks_dirty())
            .map(|w| w.variant_id)
            .collect();
        self.mark(&ids);
    }
}
