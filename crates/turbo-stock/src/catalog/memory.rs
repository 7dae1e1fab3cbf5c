//! In-memory catalog, loadable from an ERP snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::inventory::{Quant, QuantField, QuantWrite};
use super::source::{StockSource, VariantStock};
use crate::ids::{ChannelId, TemplateId, VariantId, WarehouseId};
use crate::quantities::ChannelQuantities;
use crate::{SourceError, StockError};

/// A sales channel and the warehouses whose stock it sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    /// Warehouses in scope; empty means every warehouse.
    #[serde(default)]
    pub warehouses: Vec<WarehouseId>,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            warehouses: Vec::new(),
        }
    }

    /// Restrict the channel to the given warehouses.
    pub fn with_warehouses(mut self, warehouses: impl Into<Vec<WarehouseId>>) -> Self {
        self.warehouses = warehouses.into();
        self
    }

    pub fn sells_from(&self, warehouse: WarehouseId) -> bool {
        self.warehouses.is_empty() || self.warehouses.contains(&warehouse)
    }
}

/// A product variant with its stock records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub template_id: TemplateId,
    #[serde(default)]
    pub quants: Vec<Quant>,
}

impl Variant {
    pub fn new(id: VariantId, template_id: TemplateId) -> Self {
        Self {
            id,
            template_id,
            quants: Vec::new(),
        }
    }

    /// Free quantity sellable on `channel`, never negative.
    pub fn free_qty(&self, channel: &Channel) -> f64 {
        let free: f64 = self
            .quants
            .iter()
            .filter(|q| channel.sells_from(q.warehouse))
            .map(Quant::free)
            .sum();
        free.max(0.0)
    }

    fn quant_mut(&mut self, warehouse: WarehouseId) -> Option<&mut Quant> {
        self.quants.iter_mut().find(|q| q.warehouse == warehouse)
    }
}

/// A variant taken out of the catalog, remembered by template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredVariant {
    pub id: VariantId,
    pub template_id: TemplateId,
}

/// Serialized form of a [`Catalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired: Vec<RetiredVariant>,
}

/// In-memory system of record.
///
/// Mutations return the [`QuantWrite`] they performed so the caller can
/// hand it to the dirty marker.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    channels: BTreeMap<ChannelId, Channel>,
    variants: BTreeMap<VariantId, Variant>,
    retired: BTreeMap<VariantId, TemplateId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot exported from the ERP.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SourceError> {
        let snapshot: CatalogSnapshot = serde_json::from_str(content)?;
        Ok(Self::from(snapshot))
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            channels: self.channels.values().cloned().collect(),
            variants: self.variants.values().cloned().collect(),
            retired: self
                .retired
                .iter()
                .map(|(id, template_id)| RetiredVariant {
                    id: *id,
                    template_id: *template_id,
                })
                .collect(),
        }
    }

    pub fn add_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.id, channel);
    }

    pub fn add_variant(&mut self, variant: Variant) {
        self.retired.remove(&variant.id);
        self.variants.insert(variant.id, variant);
    }

    /// Remove a variant and all of its stock records.
    ///
    /// The former template is remembered so its total can be recomputed.
    pub fn remove_variant(&mut self, id: VariantId) -> Option<QuantWrite> {
        let variant = self.variants.remove(&id)?;
        self.retired.insert(id, variant.template_id);
        Some(QuantWrite::deleted(id))
    }

    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.get(&id)
    }

    fn variant_mut(&mut self, id: VariantId) -> Result<&mut Variant, StockError> {
        self.variants
            .get_mut(&id)
            .ok_or(StockError::VariantNotFound(id))
    }

    /// Put stock in a warehouse, creating the record if needed.
    pub fn set_quantity(
        &mut self,
        id: VariantId,
        warehouse: WarehouseId,
        quantity: f64,
    ) -> Result<QuantWrite, StockError> {
        check_quantity(quantity)?;
        let variant = self.variant_mut(id)?;
        match variant.quant_mut(warehouse) {
            Some(quant) => {
                quant.quantity = quantity;
                Ok(QuantWrite::updated(id, [QuantField::Quantity]))
            }
            None => {
                variant.quants.push(Quant::new(warehouse, quantity));
                Ok(QuantWrite::created(id))
            }
        }
    }

    /// Reserve stock for an order.
    pub fn reserve(
        &mut self,
        id: VariantId,
        warehouse: WarehouseId,
        quantity: f64,
    ) -> Result<QuantWrite, StockError> {
        check_quantity(quantity)?;
        let quant = self.quant_mut(id, warehouse)?;
        let available = quant.free();
        if !quant.reserve(quantity) {
            return Err(StockError::InsufficientStock {
                variant_id: id,
                warehouse,
                requested: quantity,
                available,
            });
        }
        Ok(QuantWrite::updated(id, [QuantField::ReservedQuantity]))
    }

    /// Release a reservation.
    pub fn release(
        &mut self,
        id: VariantId,
        warehouse: WarehouseId,
        quantity: f64,
    ) -> Result<QuantWrite, StockError> {
        check_quantity(quantity)?;
        self.quant_mut(id, warehouse)?.release(quantity);
        Ok(QuantWrite::updated(id, [QuantField::ReservedQuantity]))
    }

    /// Ship reserved stock.
    pub fn commit(
        &mut self,
        id: VariantId,
        warehouse: WarehouseId,
        quantity: f64,
    ) -> Result<QuantWrite, StockError> {
        check_quantity(quantity)?;
        self.quant_mut(id, warehouse)?.commit(quantity);
        Ok(QuantWrite::updated(
            id,
            [QuantField::Quantity, QuantField::ReservedQuantity],
        ))
    }

    /// Apply a counted inventory correction.
    pub fn adjust(
        &mut self,
        id: VariantId,
        warehouse: WarehouseId,
        delta: f64,
    ) -> Result<QuantWrite, StockError> {
        // Corrections may go either way.
        if !delta.is_finite() {
            return Err(StockError::InvalidQuantity(delta));
        }
        self.quant_mut(id, warehouse)?.adjust(delta);
        Ok(QuantWrite::updated(
            id,
            [QuantField::InventoryQuantity, QuantField::Quantity],
        ))
    }

    fn quant_mut(&mut self, id: VariantId, warehouse: WarehouseId) -> Result<&mut Quant, StockError> {
        self.variant_mut(id)?
            .quant_mut(warehouse)
            .ok_or(StockError::StockRecordNotFound {
                variant_id: id,
                warehouse,
            })
    }

    fn stock_of(&self, variant: &Variant, channels: &[ChannelId]) -> VariantStock {
        let quantities = channels
            .iter()
            .map(|id| {
                let qty = self
                    .channels
                    .get(id)
                    .map(|channel| variant.free_qty(channel))
                    .unwrap_or(0.0);
                (*id, qty)
            })
            .collect::<ChannelQuantities>();
        VariantStock {
            variant_id: variant.id,
            template_id: variant.template_id,
            quantities,
        }
    }
}

fn check_quantity(quantity: f64) -> Result<(), StockError> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(StockError::InvalidQuantity(quantity));
    }
    Ok(())
}

impl From<CatalogSnapshot> for Catalog {
    fn from(snapshot: CatalogSnapshot) -> Self {
        let mut catalog = Catalog::new();
        for channel in snapshot.channels {
            catalog.add_channel(channel);
        }
        for retired in snapshot.retired {
            catalog.retired.insert(retired.id, retired.template_id);
        }
        for variant in snapshot.variants {
            catalog.add_variant(variant);
        }
        catalog
    }
}

impl StockSource for Catalog {
    fn channels(&self) -> Result<Vec<ChannelId>, SourceError> {
        Ok(self.channels.keys().copied().collect())
    }

    fn variant_stock(
        &self,
        ids: &[VariantId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.variants.get(id))
            .map(|variant| self.stock_of(variant, channels))
            .collect())
    }

    fn template_stock(
        &self,
        templates: &[TemplateId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError> {
        Ok(self
            .variants
            .values()
            .filter(|variant| templates.contains(&variant.template_id))
            .map(|variant| self.stock_of(variant, channels))
            .collect())
    }

    fn retired_templates(&self, ids: &[VariantId]) -> Result<Vec<TemplateId>, SourceError> {
        Ok(ids.iter().filter_map(|id| self.retired.get(id)).copied().collect())
    }

    fn all_variant_stock(&self, channels: &[ChannelId]) -> Result<Vec<VariantStock>, SourceError> {
        Ok(self
            .variants
            .values()
            .map(|variant| self.stock_of(variant, channels))
            .collect())
    }
}
