//! End-to-end behaviour of the stock cache against the in-memory store and
//! catalog.

use std::collections::BTreeSet;

use proptest::prelude::*;
use turbo_cache::{flush_except_protected, KvStore, MemoryStore, ProtectedKeys};
use turbo_stock::catalog::{Catalog, Channel, Quant, QuantWrite, Variant};
use turbo_stock::prelude::*;
use turbo_stock::{cached, StockSource};

const WEB: ChannelId = ChannelId::new(1);
const OUTLET: ChannelId = ChannelId::new(2);
const MAIN_WH: WarehouseId = WarehouseId::new(1);
const OUTLET_WH: WarehouseId = WarehouseId::new(2);

/// Two channels; the outlet only sells from its own warehouse.
fn shop(variants: &[(u64, u64, f64, f64)]) -> Catalog {
    let mut catalog = Catalog::new();
    catalog.add_channel(Channel::new(WEB, "web"));
    catalog.add_channel(Channel::new(OUTLET, "outlet").with_warehouses([OUTLET_WH]));
    for &(id, template, main, outlet) in variants {
        let mut variant = Variant::new(VariantId::new(id), TemplateId::new(template));
        variant.quants.push(Quant::new(MAIN_WH, main));
        variant.quants.push(Quant::new(OUTLET_WH, outlet));
        catalog.add_variant(variant);
    }
    catalog
}

fn read(store: &mut MemoryStore, id: u64) -> ChannelQuantities {
    cached::variant_stock(store, VariantId::new(id))
        .unwrap()
        .unwrap_or_else(|| panic!("no cached stock for variant {}", id))
}

fn read_template(store: &mut MemoryStore, id: u64) -> ChannelQuantities {
    cached::template_stock(store, TemplateId::new(id))
        .unwrap()
        .unwrap_or_else(|| panic!("no cached stock for template {}", id))
}

#[test]
fn test_mutation_survives_store_outage() {
    let mut catalog = shop(&[(1, 10, 5.0, 0.0)]);
    let mut store = MemoryStore::new();
    store.set_offline(true);

    let write = catalog.reserve(VariantId::new(1), MAIN_WH, 2.0).unwrap();
    DirtyMarker::new(&mut store).record(&[write]);

    let variant = catalog.variant(VariantId::new(1)).unwrap();
    assert_eq!(variant.quants[0].reserved, 2.0);
    store.set_offline(false);
    assert!(store.is_empty());
}

#[test]
fn test_reconcile_clears_markers_and_writes_ancestors() {
    let mut catalog = shop(&[(1, 10, 5.0, 1.0), (2, 10, 3.0, 0.0), (3, 20, 4.0, 4.0)]);
    let mut store = MemoryStore::new();

    let writes = vec![
        catalog.reserve(VariantId::new(1), MAIN_WH, 1.0).unwrap(),
        catalog.set_quantity(VariantId::new(3), OUTLET_WH, 6.0).unwrap(),
    ];
    DirtyMarker::new(&mut store).record(&writes);
    assert_eq!(store.len(), 2);

    let report = StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();
    assert_eq!(report.markers_cleared, 2);
    assert_eq!(report.templates_written, 2);

    assert!(store.keys().iter().all(|k| !k.starts_with("product-stock-is-dirty-")));
    // Web sells from every warehouse, the outlet only from its own.
    let v1 = read(&mut store, 1);
    assert_eq!(v1.get(WEB), Some(5.0));
    assert_eq!(v1.get(OUTLET), Some(1.0));
    let v3 = read(&mut store, 3);
    assert_eq!(v3.get(WEB), Some(10.0));
    assert_eq!(v3.get(OUTLET), Some(6.0));
    assert_eq!(read_template(&mut store, 10).get(WEB), Some(8.0));
    assert_eq!(read_template(&mut store, 20).get(OUTLET), Some(6.0));
}

#[test]
fn test_failed_write_keeps_every_marker() {
    let catalog = shop(&[(1, 10, 1.0, 0.0), (2, 11, 1.0, 0.0)]);
    let mut store = MemoryStore::new();
    DirtyMarker::new(&mut store).mark(&[VariantId::new(1), VariantId::new(2)]);
    let before = store.keys();

    store.fail_batches(true);
    assert!(StockSync::new(&mut store, &catalog).reconcile_dirty().is_err());

    assert_eq!(store.keys(), before);
    assert_eq!(store.peek("product-stock-is-dirty-1"), Some("1"));
    assert_eq!(store.peek("product-stock-is-dirty-2"), Some("2"));
}

#[test]
fn test_second_pass_is_noop() {
    let catalog = shop(&[(1, 10, 1.0, 0.0), (2, 10, 2.0, 0.0)]);
    let mut store = MemoryStore::new();
    DirtyMarker::new(&mut store).mark(&[VariantId::new(1)]);

    StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();
    let values: Vec<Option<String>> = store.keys().iter().map(|k| store.peek(k).map(String::from)).collect();
    let stats = store.stats();

    let report = StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();
    assert!(report.is_noop());
    assert_eq!(report.variants_written, 0);
    assert_eq!(store.stats(), stats);
    let after: Vec<Option<String>> = store.keys().iter().map(|k| store.peek(k).map(String::from)).collect();
    assert_eq!(after, values);
}

#[test]
fn test_template_sum_of_variants() {
    let catalog = shop(&[(1, 10, 2.0, 0.0), (2, 10, 3.5, 0.0), (3, 10, 0.0, 0.0)]);
    let mut store = MemoryStore::new();
    DirtyMarker::new(&mut store).mark(&[VariantId::new(3)]);

    StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();

    assert_eq!(read_template(&mut store, 10).get(WEB), Some(5.5));
}

#[test]
fn test_flush_spares_protected_keys() {
    let mut store = MemoryStore::new();
    for key in ["product-stock-42", "product-stock-is-dirty-42", "cart:abc", "unrelated:key"] {
        store.set(key, "x").unwrap();
    }

    let report = flush_except_protected(&mut store, &ProtectedKeys::default(), 100).unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(
        store.keys(),
        vec!["cart:abc", "product-stock-42", "product-stock-is-dirty-42"]
    );
}

#[test]
fn test_rebuild_matches_source() {
    let catalog = shop(&[
        (1, 10, 2.0, 1.0),
        (2, 10, 3.5, 0.0),
        (3, 20, 0.0, 7.0),
        (4, 30, 9.0, 0.0),
    ]);
    let mut store = MemoryStore::new();

    let report = StockSync::new(&mut store, &catalog).rebuild_all().unwrap();
    assert_eq!(report.variants_written, 4);
    assert_eq!(report.templates_written, 3);

    let channels = catalog.channels().unwrap();
    let expected = catalog.all_variant_stock(&channels).unwrap();
    let mut templates = BTreeSet::new();
    for stock in &expected {
        assert_eq!(read(&mut store, stock.variant_id.get()), stock.quantities);
        templates.insert(stock.template_id);
    }
    for template in templates {
        let siblings = expected.iter().filter(|s| s.template_id == template);
        let sum = ChannelQuantities::sum(siblings.map(|s| &s.quantities));
        assert_eq!(read_template(&mut store, template.get()), sum);
    }
}

#[test]
fn test_malformed_marker_does_not_block_others() {
    let catalog = shop(&[(1, 10, 1.0, 0.0)]);
    let mut store = MemoryStore::new();
    store.set("product-stock-is-dirty-oops", "oops").unwrap();
    DirtyMarker::new(&mut store).mark(&[VariantId::new(1)]);

    let report = StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();

    assert_eq!(report.malformed_keys, vec!["product-stock-is-dirty-oops"]);
    assert!(store.contains("product-stock-1"));
    assert!(!store.contains("product-stock-is-dirty-1"));
}

#[test]
fn test_removed_variant_corrects_template_in_same_pass() {
    let mut catalog = shop(&[(1, 10, 1.0, 0.0), (2, 10, 4.0, 2.0)]);
    let mut store = MemoryStore::new();
    StockSync::new(&mut store, &catalog).rebuild_all().unwrap();
    assert_eq!(read_template(&mut store, 10).get(WEB), Some(5.0));

    let write: QuantWrite = catalog.remove_variant(VariantId::new(2)).unwrap();
    DirtyMarker::new(&mut store).record(&[write]);
    let report = StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();

    assert_eq!(report.variants_removed, 1);
    assert!(!store.contains("product-stock-2"));
    let template = read_template(&mut store, 10);
    assert_eq!(template.get(WEB), Some(1.0));
    assert_eq!(template.get(OUTLET), Some(0.0));
    assert!(StockSync::new(&mut store, &catalog)
        .reconcile_dirty()
        .unwrap()
        .is_noop());
}

proptest! {
    #[test]
    fn prop_reconcile_converges_for_any_dirty_set(
        quantities in proptest::collection::vec(0.0f64..50.0, 1..12),
        dirty in proptest::collection::btree_set(0usize..12, 0..12),
    ) {
        let variants: Vec<(u64, u64, f64, f64)> = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| (i as u64 + 1, i as u64 % 4 + 100, *q, 0.0))
            .collect();
        let catalog = shop(&variants);
        let mut store = MemoryStore::new();
        let ids: Vec<VariantId> = dirty
            .iter()
            .filter(|i| **i < variants.len())
            .map(|i| VariantId::new(*i as u64 + 1))
            .collect();
        DirtyMarker::new(&mut store).mark(&ids);

        StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();

        for id in &ids {
            let dirty_key = format!("product-stock-is-dirty-{}", id);
            let stock_key = format!("product-stock-{}", id);
            prop_assert!(!store.contains(&dirty_key));
            prop_assert!(store.contains(&stock_key));
            let variant = catalog.variant(*id).unwrap();
            let template_key = format!("product-template-stock-{}", variant.template_id);
            prop_assert!(store.contains(&template_key));
        }

        let stats = store.stats();
        let again = StockSync::new(&mut store, &catalog).reconcile_dirty().unwrap();
        prop_assert!(again.is_noop());
        prop_assert_eq!(store.stats(), stats);
    }
}
