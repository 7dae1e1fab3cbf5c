//! Key formats of the stock cache.
//!
//! | key                             | value                              |
//! |---------------------------------|------------------------------------|
//! | `product-stock-is-dirty-<id>`   | decimal variant id                 |
//! | `product-stock-<id>`            | JSON object channel id → quantity  |
//! | `product-template-stock-<id>`   | JSON object channel id → quantity  |

use std::fmt;

use crate::ids::{parse_decimal, TemplateId, VariantId};

pub const DIRTY_PREFIX: &str = "product-stock-is-dirty-";
pub const VARIANT_STOCK_PREFIX: &str = "product-stock-";
pub const TEMPLATE_STOCK_PREFIX: &str = "product-template-stock-";

/// A key owned by the stock cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockKey {
    /// Dirty marker for a variant.
    Dirty(VariantId),
    /// Canonical per-channel quantities of a variant.
    Variant(VariantId),
    /// Canonical per-channel quantities summed over a template's variants.
    Template(TemplateId),
}

impl StockKey {
    /// Parse a key name. Returns `None` for foreign or malformed keys.
    pub fn parse(key: &str) -> Option<Self> {
        // The dirty prefix extends the variant prefix, so it goes first.
        if let Some(rest) = key.strip_prefix(DIRTY_PREFIX) {
            return parse_decimal(rest).map(|id| StockKey::Dirty(VariantId::new(id)));
        }
        if let Some(rest) = key.strip_prefix(TEMPLATE_STOCK_PREFIX) {
            return parse_decimal(rest).map(|id| StockKey::Template(TemplateId::new(id)));
        }
        if let Some(rest) = key.strip_prefix(VARIANT_STOCK_PREFIX) {
            return parse_decimal(rest).map(|id| StockKey::Variant(VariantId::new(id)));
        }
        None
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockKey::Dirty(id) => write!(f, "{}{}", DIRTY_PREFIX, id),
            StockKey::Variant(id) => write!(f, "{}{}", VARIANT_STOCK_PREFIX, id),
            StockKey::Template(id) => write!(f, "{}{}", TEMPLATE_STOCK_PREFIX, id),
        }
    }
}

pub fn dirty_key(id: VariantId) -> String {
    StockKey::Dirty(id).to_string()
}

pub fn variant_stock_key(id: VariantId) -> String {
    StockKey::Variant(id).to_string()
}

pub fn template_stock_key(id: TemplateId) -> String {
    StockKey::Template(id).to_string()
}

/// Scan pattern matching every dirty marker.
pub fn dirty_pattern() -> String {
    format!("{}*", DIRTY_PREFIX)
}

/// Scan pattern matching canonical variant keys (and dirty markers, which
/// share the prefix; filter with [`StockKey::parse`]).
pub fn variant_stock_pattern() -> String {
    format!("{}*", VARIANT_STOCK_PREFIX)
}

pub fn template_stock_pattern() -> String {
    format!("{}*", TEMPLATE_STOCK_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(dirty_key(VariantId::new(42)), "product-stock-is-dirty-42");
        assert_eq!(variant_stock_key(VariantId::new(42)), "product-stock-42");
        assert_eq!(template_stock_key(TemplateId::new(7)), "product-template-stock-7");
        assert_eq!(dirty_pattern(), "product-stock-is-dirty-*");
    }

    #[test]
    fn test_dirty_key_is_not_a_variant_key() {
        assert_eq!(
            StockKey::parse("product-stock-is-dirty-42"),
            Some(StockKey::Dirty(VariantId::new(42)))
        );
        assert_eq!(
            StockKey::parse("product-stock-42"),
            Some(StockKey::Variant(VariantId::new(42)))
        );
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(StockKey::parse("product-stock-is-dirty-"), None);
        assert_eq!(StockKey::parse("product-stock-is-dirty-abc"), None);
        assert_eq!(StockKey::parse("product-stock-is-dirty-4 2"), None);
        assert_eq!(StockKey::parse("product-stock-is-dirty"), None);
        assert_eq!(StockKey::parse("cart:42"), None);
    }

    proptest! {
        #[test]
        fn prop_formatted_keys_parse_back(id in any::<u64>()) {
            for key in [
                StockKey::Dirty(VariantId::new(id)),
                StockKey::Variant(VariantId::new(id)),
                StockKey::Template(TemplateId::new(id)),
            ] {
                prop_assert_eq!(StockKey::parse(&key.to_string()), Some(key));
            }
        }
    }
}
