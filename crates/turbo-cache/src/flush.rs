//! Administrative purge of unrelated cached content.

use serde::Serialize;
use tracing::{debug, info};

use crate::kv::KvStore;
use crate::{CacheError, ProtectedKeys};

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Keys examined by the scan.
    pub scanned: u64,
    /// Keys deleted.
    pub deleted: u64,
}

/// Delete every key that is not protected.
///
/// Walks the keyspace with a cursor scan of `batch_size` keys per step and
/// deletes each step's unprotected keys right away. Steps are independent:
/// an interrupted flush leaves earlier deletions in place and can simply be
/// run again.
#[tracing::instrument(skip(store, protected))]
pub fn flush_except_protected<S: KvStore>(
    store: &mut S,
    protected: &ProtectedKeys,
    batch_size: usize,
) -> Result<FlushReport, CacheError> {
    let mut report = FlushReport::default();

    store.scan_each("*", batch_size.max(1), |store, keys| {
        report.scanned += keys.len() as u64;
        let doomed: Vec<String> = keys
            .into_iter()
            .filter(|key| !protected.is_protected(key))
            .collect();
        if !doomed.is_empty() {
            report.deleted += store.delete(&doomed)?;
            debug!(count = doomed.len(), "deleted unprotected keys");
        }
        Ok(())
    })?;

    info!(scanned = report.scanned, deleted = report.deleted, "cache flushed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_flush_deletes_only_unprotected_keys() {
        let mut store = MemoryStore::new();
        for key in ["product-stock-42", "product-stock-is-dirty-42", "cart:abc", "unrelated:key"] {
            store.set(key, "x").unwrap();
        }

        let report = flush_except_protected(&mut store, &ProtectedKeys::default(), 100).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.scanned, 4);
        assert!(!store.contains("unrelated:key"));
        assert!(store.contains("product-stock-42"));
        assert!(store.contains("product-stock-is-dirty-42"));
        assert!(store.contains("cart:abc"));
    }

    #[test]
    fn test_flush_large_keyspace_in_small_batches() {
        let mut store = MemoryStore::new();
        for i in 0..250 {
            store.set(&format!("page:{}", i), "html").unwrap();
            store.set(&format!("cart:{}", i), "{}").unwrap();
        }

        let report = flush_except_protected(&mut store, &ProtectedKeys::default(), 7).unwrap();

        assert_eq!(report.deleted, 250);
        assert_eq!(store.len(), 250);
        assert!(store.keys().iter().all(|k| k.starts_with("cart:")));
    }

    #[test]
    fn test_flush_unreachable_store_fails() {
        let mut store = MemoryStore::new();
        store.set("page:1", "x").unwrap();
        store.set_offline(true);

        let err = flush_except_protected(&mut store, &ProtectedKeys::default(), 10).unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_flush_is_resumable_after_interruption() {
        let mut store = MemoryStore::new();
        for i in 0..20 {
            store.set(&format!("menu:{}", i), "x").unwrap();
        }
        store.set("product-stock-1", "{}").unwrap();

        // Simulate a pass that died after its first step.
        let (_, first) = store.scan(0, "*", 5).unwrap();
        store.delete(&first).unwrap();

        flush_except_protected(&mut store, &ProtectedKeys::default(), 5).unwrap();
        assert_eq!(store.keys(), vec!["product-stock-1".to_string()]);
    }
}
