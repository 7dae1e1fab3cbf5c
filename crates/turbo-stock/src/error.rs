//! Stock cache error types.

use thiserror::Error;
use turbo_cache::CacheError;

use crate::ids::{VariantId, WarehouseId};

/// Errors raised by the authoritative stock source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The system of record could not be queried.
    #[error("Stock source unavailable: {0}")]
    Unavailable(String),

    /// Failed to read a catalog snapshot.
    #[error("Failed to read catalog snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot content is not valid.
    #[error("Invalid catalog snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by cache-invalidation notifications.
#[derive(Error, Debug)]
pub enum InvalidationError {
    /// URL or key is not usable.
    #[error("Invalid cache invalidation settings: {0}")]
    Config(String),

    /// The HTTP request failed or returned an error status.
    #[error("Cache invalidation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Errors that can occur in stock cache operations.
#[derive(Error, Debug)]
pub enum StockError {
    /// Variant not found.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// Insufficient stock.
    #[error("Insufficient stock for variant {variant_id} in warehouse {warehouse}: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: VariantId,
        warehouse: WarehouseId,
        requested: f64,
        available: f64,
    },

    /// The variant holds no stock record in that warehouse.
    #[error("No stock record for variant {variant_id} in warehouse {warehouse}")]
    StockRecordNotFound {
        variant_id: VariantId,
        warehouse: WarehouseId,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    /// Dirty markers kept changing while a pass was applying them.
    #[error("Dirty markers changed during reconciliation {attempts} times in a row")]
    ConcurrentModification { attempts: usize },

    /// Cache store error.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Authoritative source error.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Notification error.
    #[error(transparent)]
    Invalidation(#[from] InvalidationError),
}

impl StockError {
    /// Whether the failure came from the cache store being unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StockError::Cache(e) if e.is_connectivity())
    }
}
