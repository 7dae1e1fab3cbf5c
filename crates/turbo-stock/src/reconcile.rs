//! Dirty-driven reconciliation of the stock cache.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use turbo_cache::{KvStore, WriteBatch};

use crate::catalog::{StockSource, VariantStock};
use crate::ids::{parse_decimal, ChannelId, TemplateId, VariantId};
use crate::keys::{self, StockKey};
use crate::quantities::ChannelQuantities;
use crate::StockError;

/// Batch sizes used when talking to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Keys examined per scan step.
    pub scan_batch: usize,
    /// Maximum ops per pipelined batch during a full rebuild.
    pub write_batch: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            scan_batch: 100,
            write_batch: 500,
        }
    }
}

/// Passes that lose the race against a concurrent marker write before
/// giving up and leaving the markers for the next pass.
const MAX_PASS_ATTEMPTS: usize = 3;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Dirty markers consumed by the pass.
    pub markers_found: usize,
    pub variants_written: usize,
    pub templates_written: usize,
    /// Variants no longer in the source whose canonical key was deleted.
    pub variants_removed: usize,
    /// Templates left without variants whose canonical key was deleted.
    pub templates_removed: usize,
    /// Marker keys that could not be tied to a variant.
    pub malformed_keys: Vec<String>,
    pub markers_cleared: u64,
    /// Tries needed because markers were rewritten mid-pass.
    pub attempts: usize,
}

impl ReconcileReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            markers_found: 0,
            variants_written: 0,
            templates_written: 0,
            variants_removed: 0,
            templates_removed: 0,
            malformed_keys: Vec::new(),
            markers_cleared: 0,
            attempts: 1,
        }
    }

    /// Whether the pass found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.markers_found == 0
    }
}

/// Keeps canonical stock keys in sync with the system of record.
///
/// Owns a store handle and a source handle; pass `&mut store` / `&source`
/// to keep ownership at the call site.
pub struct StockSync<S, Src> {
    pub(crate) store: S,
    pub(crate) source: Src,
    pub(crate) options: SyncOptions,
}

impl<S: KvStore, Src: StockSource> StockSync<S, Src> {
    pub fn new(store: S, source: Src) -> Self {
        Self {
            store,
            source,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one reconciliation pass.
    ///
    /// Discovers dirty markers and watches them, recomputes the affected
    /// variants and their templates, then writes every canonical key and
    /// deletes the consumed markers in one watched batch. A marker rewritten
    /// after the source read discards the batch and the pass starts over.
    /// Any failure leaves the store untouched and the markers in place.
    #[tracing::instrument(skip(self))]
    pub fn reconcile_dirty(&mut self) -> Result<ReconcileReport, StockError> {
        let started_at = Utc::now();
        for attempt in 1..=MAX_PASS_ATTEMPTS {
            if let Some(mut report) = self.try_pass(started_at)? {
                report.attempts = attempt;
                report.finished_at = Utc::now();
                if !report.is_noop() {
                    info!(
                        markers = report.markers_found,
                        variants = report.variants_written,
                        templates = report.templates_written,
                        removed = report.variants_removed,
                        attempts = attempt,
                        "reconciled dirty stock"
                    );
                }
                return Ok(report);
            }
            warn!(attempt, "dirty markers rewritten during pass, starting over");
        }
        Err(StockError::ConcurrentModification {
            attempts: MAX_PASS_ATTEMPTS,
        })
    }

    /// One attempt. `None` means the watched batch was discarded.
    fn try_pass(&mut self, started_at: DateTime<Utc>) -> Result<Option<ReconcileReport>, StockError> {
        let (markers, malformed_keys) = self.collect_markers()?;

        let mut report = ReconcileReport::empty(started_at);
        report.malformed_keys = malformed_keys;
        if markers.is_empty() {
            debug!("no dirty markers");
            return Ok(Some(report));
        }
        report.markers_found = markers.len();

        let consumed: Vec<String> = markers.keys().cloned().collect();
        self.store.watch(&consumed)?;

        let mut batch = match self.plan(&markers, &mut report) {
            Ok(batch) => batch,
            Err(e) => {
                if let Err(unwatch) = self.store.unwatch() {
                    debug!(error = %unwatch, "failed to release watched markers");
                }
                return Err(e);
            }
        };
        for key in &consumed {
            batch.delete(key.as_str());
        }

        match self.store.execute_watched(&batch) {
            Ok(true) => {
                report.markers_cleared = consumed.len() as u64;
                Ok(Some(report))
            }
            Ok(false) => Ok(None),
            Err(e) => {
                error!(error = %e, markers = consumed.len(), "stock write failed, keeping dirty markers for retry");
                Err(e.into())
            }
        }
    }

    /// Read the source and queue the canonical writes for `markers`.
    fn plan(
        &self,
        markers: &BTreeMap<String, VariantId>,
        report: &mut ReconcileReport,
    ) -> Result<WriteBatch, StockError> {
        let ids: Vec<VariantId> = markers
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let channels = self.source.channels()?;
        let stocks = self.source.variant_stock(&ids, &channels)?;

        let found: BTreeSet<VariantId> = stocks.iter().map(|s| s.variant_id).collect();
        let missing: Vec<VariantId> = ids.iter().copied().filter(|id| !found.contains(id)).collect();

        let mut templates: BTreeSet<TemplateId> = stocks.iter().map(|s| s.template_id).collect();
        if !missing.is_empty() {
            // A removed variant no longer counts towards its former template.
            templates.extend(self.source.retired_templates(&missing)?);
        }
        let templates: Vec<TemplateId> = templates.into_iter().collect();

        // Non-dirty siblings still count towards the template total.
        let siblings = self.source.template_stock(&templates, &channels)?;
        let live: BTreeSet<TemplateId> = siblings.iter().map(|s| s.template_id).collect();
        let totals = template_totals(&siblings, &templates, &channels);

        let mut batch = WriteBatch::new();
        for stock in &stocks {
            batch.set_json(keys::variant_stock_key(stock.variant_id), &stock.quantities)?;
        }
        for (template, quantities) in &totals {
            if live.contains(template) {
                batch.set_json(keys::template_stock_key(*template), quantities)?;
                report.templates_written += 1;
            } else {
                debug!(template_id = %template, "template has no variants left, dropping cached stock");
                batch.delete(keys::template_stock_key(*template));
                report.templates_removed += 1;
            }
        }
        for id in &missing {
            debug!(variant_id = %id, "variant gone from source, dropping cached stock");
            batch.delete(keys::variant_stock_key(*id));
        }

        report.variants_written = stocks.len();
        report.variants_removed = missing.len();
        Ok(batch)
    }

    /// Scan for dirty markers, keyed by marker name.
    ///
    /// The key name is authoritative. The stored value is only consulted
    /// when the name does not parse.
    fn collect_markers(&mut self) -> Result<(BTreeMap<String, VariantId>, Vec<String>), StockError> {
        let mut markers = BTreeMap::new();
        let mut malformed = BTreeSet::new();

        self.store
            .scan_each(&keys::dirty_pattern(), self.options.scan_batch.max(1), |store, batch| {
                for key in batch {
                    if markers.contains_key(&key) || malformed.contains(&key) {
                        continue;
                    }
                    if let Some(StockKey::Dirty(id)) = StockKey::parse(&key) {
                        markers.insert(key, id);
                        continue;
                    }
                    match store.get(&key)?.as_deref().and_then(parse_decimal) {
                        Some(id) => {
                            warn!(key = %key, variant_id = id, "dirty marker name unparseable, using stored id");
                            markers.insert(key, VariantId::new(id));
                        }
                        None => {
                            warn!(key = %key, "skipping malformed dirty marker");
                            malformed.insert(key);
                        }
                    }
                }
                Ok(())
            })?;

        Ok((markers, malformed.into_iter().collect()))
    }
}

/// Sum variant quantities per template, with a zero entry for every channel.
pub(crate) fn template_totals(
    variants: &[VariantStock],
    templates: &[TemplateId],
    channels: &[ChannelId],
) -> BTreeMap<TemplateId, ChannelQuantities> {
    let mut totals: BTreeMap<TemplateId, ChannelQuantities> = templates
        .iter()
        .map(|t| (*t, ChannelQuantities::zeroed(channels)))
        .collect();
    for variant in variants {
        if let Some(total) = totals.get_mut(&variant.template_id) {
            total.accumulate(&variant.quantities);
        }
    }
    totals
}
