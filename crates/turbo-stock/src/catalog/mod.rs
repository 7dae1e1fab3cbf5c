//! Authoritative catalog and inventory.
//!
//! Contains the stock records of the system of record, the [`StockSource`]
//! query contract the reconciler reads through, and an in-memory
//! [`Catalog`] implementing it.

mod inventory;
mod memory;
mod source;

pub use inventory::{Quant, QuantField, QuantWrite, QuantWriteKind};
pub use memory::{Catalog, CatalogSnapshot, Channel, RetiredVariant, Variant};
pub use source::{StockSource, VariantStock};
