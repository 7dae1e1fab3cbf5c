//! Stock availability cache for TurboCommerce storefronts.
//!
//! Keeps per-channel free quantities of every product variant and template
//! in the external key-value store so storefront reads never recompute them.
//! The cache is eventually consistent:
//!
//! - stock writes mark the affected variants dirty ([`DirtyMarker`]),
//! - a scheduled pass recomputes dirty variants and their templates
//!   ([`StockSync::reconcile_dirty`]),
//! - an operator can recompute everything ([`StockSync::rebuild_all`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::MemoryStore;
//! use turbo_stock::prelude::*;
//!
//! let mut store = MemoryStore::new();
//! let mut catalog = Catalog::load("catalog.json")?;
//!
//! // A sale reserves stock; the write marks the variant dirty.
//! let write = catalog.reserve(VariantId::new(7), WarehouseId::new(1), 2.0)?;
//! DirtyMarker::new(&mut store).record(&[write]);
//!
//! // Later, the scheduler reconciles.
//! let report = StockSync::new(&mut store, &catalog).reconcile_dirty()?;
//! ```

pub mod cached;
pub mod catalog;
mod dirty;
mod error;
mod ids;
pub mod invalidation;
pub mod keys;
mod quantities;
mod rebuild;
mod reconcile;

pub use catalog::{Catalog, StockSource, VariantStock};
pub use dirty::DirtyMarker;
pub use error::{InvalidationError, SourceError, StockError};
pub use ids::{CategoryId, ChannelId, RewriteId, TemplateId, VariantId, WarehouseId};
pub use invalidation::{
    notify_best_effort, CacheTag, HttpNotifier, InvalidationConfig, InvalidationKey, Notifier,
};
pub use keys::StockKey;
pub use quantities::ChannelQuantities;
pub use rebuild::RebuildReport;
pub use reconcile::{ReconcileReport, StockSync, SyncOptions};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{Catalog, Channel, Quant, QuantField, QuantWrite, Variant};
    pub use crate::{
        ChannelId, ChannelQuantities, DirtyMarker, ReconcileReport, StockError, StockSync,
        SyncOptions, TemplateId, VariantId, WarehouseId,
    };
}
