//! Read side of the stock cache, as the storefront sees it.

use turbo_cache::KvStore;

use crate::ids::{TemplateId, VariantId};
use crate::keys;
use crate::quantities::ChannelQuantities;
use crate::StockError;

/// Cached per-channel quantities of a variant, if present.
pub fn variant_stock<S: KvStore>(
    store: &mut S,
    id: VariantId,
) -> Result<Option<ChannelQuantities>, StockError> {
    Ok(store.get_json(&keys::variant_stock_key(id))?)
}

/// Cached per-channel quantities of a template, if present.
pub fn template_stock<S: KvStore>(
    store: &mut S,
    id: TemplateId,
) -> Result<Option<ChannelQuantities>, StockError> {
    Ok(store.get_json(&keys::template_stock_key(id))?)
}

/// Whether a variant has a pending dirty marker.
pub fn is_dirty<S: KvStore>(store: &mut S, id: VariantId) -> Result<bool, StockError> {
    Ok(store.get(&keys::dirty_key(id))?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ChannelId;
    use turbo_cache::MemoryStore;

    #[test]
    fn test_reads_canonical_keys() {
        let mut store = MemoryStore::new();
        store.set("product-stock-4", r#"{"1":2.5}"#).unwrap();
        store.set("product-stock-is-dirty-4", "4").unwrap();

        let stock = variant_stock(&mut store, VariantId::new(4)).unwrap().unwrap();
        assert_eq!(stock.get(ChannelId::new(1)), Some(2.5));
        assert!(is_dirty(&mut store, VariantId::new(4)).unwrap());
        assert!(!is_dirty(&mut store, VariantId::new(5)).unwrap());
        assert!(template_stock(&mut store, TemplateId::new(1)).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let mut store = MemoryStore::new();
        store.set("product-stock-4", "not json").unwrap();
        assert!(variant_stock(&mut store, VariantId::new(4)).is_err());
    }
}
