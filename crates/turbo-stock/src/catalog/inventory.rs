//! Inventory tracking types.

use crate::ids::{VariantId, WarehouseId};
use serde::{Deserialize, Serialize};

/// On-hand stock of one variant in one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quant {
    /// Warehouse holding the stock.
    pub warehouse: WarehouseId,
    /// Total quantity on hand.
    pub quantity: f64,
    /// Quantity reserved for pending orders.
    #[serde(default)]
    pub reserved: f64,
}

impl Quant {
    pub fn new(warehouse: WarehouseId, quantity: f64) -> Self {
        Self {
            warehouse,
            quantity,
            reserved: 0.0,
        }
    }

    /// Free quantity (on hand minus reserved). May be negative when
    /// reservations exceed stock; channel totals are clamped later.
    pub fn free(&self) -> f64 {
        self.quantity - self.reserved
    }

    /// Reserve for an order. Returns false if not enough is free.
    pub fn reserve(&mut self, quantity: f64) -> bool {
        if quantity > self.free() {
            return false;
        }
        self.reserved += quantity;
        true
    }

    /// Release reserved stock (e.g., order cancelled).
    pub fn release(&mut self, quantity: f64) {
        self.reserved = (self.reserved - quantity).max(0.0);
    }

    /// Ship reserved stock.
    pub fn commit(&mut self, quantity: f64) {
        self.reserved = (self.reserved - quantity).max(0.0);
        self.quantity = (self.quantity - quantity).max(0.0);
    }

    /// Apply a counted inventory correction.
    pub fn adjust(&mut self, delta: f64) {
        self.quantity = (self.quantity + delta).max(0.0);
    }
}

/// Field of a stock record touched by a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantField {
    Quantity,
    ReservedQuantity,
    InventoryQuantity,
    /// Location, lot, owner, and other fields with no effect on availability.
    Other,
}

impl QuantField {
    /// Whether writing this field changes available quantity.
    pub fn affects_stock(&self) -> bool {
        matches!(
            self,
            QuantField::Quantity | QuantField::ReservedQuantity | QuantField::InventoryQuantity
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuantField::Quantity => "quantity",
            QuantField::ReservedQuantity => "reserved_quantity",
            QuantField::InventoryQuantity => "inventory_quantity",
            QuantField::Other => "other",
        }
    }
}

/// Kind of write applied to a stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantWriteKind {
    Create,
    Update(Vec<QuantField>),
    Delete,
}

/// A write to a stock record, as reported to the dirty marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantWrite {
    pub variant_id: VariantId,
    pub kind: QuantWriteKind,
}

impl QuantWrite {
    pub fn created(variant_id: VariantId) -> Self {
        Self {
            variant_id,
            kind: QuantWriteKind::Create,
        }
    }

    pub fn updated(variant_id: VariantId, fields: impl Into<Vec<QuantField>>) -> Self {
        Self {
            variant_id,
            kind: QuantWriteKind::Update(fields.into()),
        }
    }

    pub fn deleted(variant_id: VariantId) -> Self {
        Self {
            variant_id,
            kind: QuantWriteKind::Delete,
        }
    }

    /// Creates and deletes always change availability; updates only when a
    /// quantity field was written.
    pub fn marks_dirty(&self) -> bool {
        match &self.kind {
            QuantWriteKind::Create | QuantWriteKind::Delete => true,
            QuantWriteKind::Update(fields) => fields.iter().any(QuantField::affects_stock),
        }
    }
}
