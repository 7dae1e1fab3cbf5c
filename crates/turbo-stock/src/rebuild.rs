//! Full recomputation of every canonical stock key.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use turbo_cache::{KvStore, WriteBatch};

use crate::catalog::StockSource;
use crate::ids::{TemplateId, VariantId};
use crate::keys::{self, StockKey};
use crate::reconcile::{template_totals, StockSync};
use crate::StockError;

/// Outcome of a full rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub variants_written: usize,
    pub templates_written: usize,
    /// Canonical keys removed because their product no longer exists.
    pub pruned: u64,
    /// Pipelined batches sent.
    pub batches: usize,
}

impl<S: KvStore, Src: StockSource> StockSync<S, Src> {
    /// Recompute and write the canonical stock of every variant and template.
    ///
    /// Writes go out in chunks of `write_batch` ops, so a failure part way
    /// leaves earlier chunks applied; every key written holds a correct
    /// value. Dirty markers are left alone for the next reconciliation,
    /// which makes rerunning after a failure safe.
    #[tracing::instrument(skip(self))]
    pub fn rebuild_all(&mut self) -> Result<RebuildReport, StockError> {
        let started_at = Utc::now();
        let channels = self.source.channels()?;
        let stocks = self.source.all_variant_stock(&channels)?;

        let templates: Vec<TemplateId> = stocks
            .iter()
            .map(|s| s.template_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let totals = template_totals(&stocks, &templates, &channels);

        let chunk = self.options.write_batch.max(1);
        let mut batch = WriteBatch::new();
        let mut batches = 0;
        for stock in &stocks {
            batch.set_json(keys::variant_stock_key(stock.variant_id), &stock.quantities)?;
            if batch.len() >= chunk {
                self.flush_batch(&mut batch, &mut batches)?;
            }
        }
        for (template, quantities) in &totals {
            batch.set_json(keys::template_stock_key(*template), quantities)?;
            if batch.len() >= chunk {
                self.flush_batch(&mut batch, &mut batches)?;
            }
        }
        self.flush_batch(&mut batch, &mut batches)?;

        let variants: BTreeSet<VariantId> = stocks.iter().map(|s| s.variant_id).collect();
        let templates: BTreeSet<TemplateId> = templates.into_iter().collect();
        let pruned = self.prune_stale(&variants, &templates)?;

        let report = RebuildReport {
            started_at,
            finished_at: Utc::now(),
            variants_written: stocks.len(),
            templates_written: totals.len(),
            pruned,
            batches,
        };
        info!(
            variants = report.variants_written,
            templates = report.templates_written,
            pruned = report.pruned,
            batches = report.batches,
            "rebuilt stock cache"
        );
        Ok(report)
    }

    fn flush_batch(&mut self, batch: &mut WriteBatch, sent: &mut usize) -> Result<(), StockError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.store.execute(batch)?;
        *sent += 1;
        debug!(ops = batch.len(), batch = *sent, "stock batch written");
        *batch = WriteBatch::new();
        Ok(())
    }

    /// Delete canonical keys for variants and templates the source no
    /// longer knows about.
    fn prune_stale(
        &mut self,
        variants: &BTreeSet<VariantId>,
        templates: &BTreeSet<TemplateId>,
    ) -> Result<u64, StockError> {
        let count = self.options.scan_batch.max(1);
        let mut pruned = 0;
        for pattern in [keys::variant_stock_pattern(), keys::template_stock_pattern()] {
            self.store.scan_each(&pattern, count, |store, batch| {
                let stale: Vec<String> = batch
                    .into_iter()
                    .filter(|key| match StockKey::parse(key) {
                        Some(StockKey::Variant(id)) => !variants.contains(&id),
                        Some(StockKey::Template(id)) => !templates.contains(&id),
                        // Dirty markers share the variant prefix.
                        _ => false,
                    })
                    .collect();
                if !stale.is_empty() {
                    pruned += store.delete(&stale)?;
                }
                Ok(())
            })?;
        }
        if pruned > 0 {
            debug!(pruned, "pruned stale stock keys");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Channel, Quant, Variant};
    use crate::ids::{ChannelId, WarehouseId};
    use crate::quantities::ChannelQuantities;
    use crate::reconcile::SyncOptions;
    use turbo_cache::MemoryStore;

    fn catalog(variants: u64) -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_channel(Channel::new(ChannelId::new(1), "web"));
        for i in 1..=variants {
            let mut v = Variant::new(VariantId::new(i), TemplateId::new(100 + i % 3));
            v.quants.push(Quant::new(WarehouseId::new(1), i as f64));
            catalog.add_variant(v);
        }
        catalog
    }

    #[test]
    fn test_rebuild_populates_empty_cache() {
        let mut store = MemoryStore::new();
        let source = catalog(6);

        let report = StockSync::new(&mut store, &source).rebuild_all().unwrap();

        assert_eq!(report.variants_written, 6);
        assert_eq!(report.templates_written, 3);
        assert_eq!(report.batches, 1);
        // Template 100 holds variants 3 and 6.
        let total: ChannelQuantities =
            serde_json::from_str(store.peek("product-template-stock-100").unwrap()).unwrap();
        assert_eq!(total.get(ChannelId::new(1)), Some(9.0));
    }

    #[test]
    fn test_rebuild_chunks_writes() {
        let mut store = MemoryStore::new();
        let source = catalog(10);
        let options = SyncOptions {
            scan_batch: 100,
            write_batch: 4,
        };

        let report = StockSync::new(&mut store, &source)
            .with_options(options)
            .rebuild_all()
            .unwrap();

        // 10 variants + 3 templates in chunks of 4.
        assert_eq!(report.batches, 4);
        assert_eq!(store.stats().batches, 4);
        assert_eq!(store.len(), 13);
    }

    #[test]
    fn test_rebuild_prunes_stale_keys_and_keeps_markers() {
        let mut store = MemoryStore::new();
        store.set("product-stock-99", r#"{"1":1.0}"#).unwrap();
        store.set("product-template-stock-999", r#"{"1":1.0}"#).unwrap();
        store.set("product-stock-is-dirty-2", "2").unwrap();
        store.set("cart:1", "{}").unwrap();
        let source = catalog(2);

        let report = StockSync::new(&mut store, &source).rebuild_all().unwrap();

        assert_eq!(report.pruned, 2);
        assert!(!store.contains("product-stock-99"));
        assert!(!store.contains("product-template-stock-999"));
        assert!(store.contains("product-stock-is-dirty-2"));
        assert!(store.contains("cart:1"));
    }

    #[test]
    fn test_rebuild_is_rerunnable_after_failure() {
        let mut store = MemoryStore::new();
        let source = catalog(3);
        store.fail_batches(true);
        assert!(StockSync::new(&mut store, &source).rebuild_all().is_err());

        store.fail_batches(false);
        let report = StockSync::new(&mut store, &source).rebuild_all().unwrap();
        assert_eq!(report.variants_written, 3);
        assert!(store.contains("product-stock-3"));
    }
}
