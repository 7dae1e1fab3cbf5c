//! Inspect cached stock.

use anyhow::Result;
use serde::Serialize;
use turbo_cache::{KvStore, RedisStore};
use turbo_stock::{cached, keys, ChannelQuantities, TemplateId, VariantId};

use super::ShowArgs;
use crate::context::{blocking, connect_store, Context};
use crate::output::format_quantity;

#[derive(Debug, Serialize)]
struct CachedEntry {
    key: String,
    stock: Option<ChannelQuantities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dirty: Option<bool>,
}

#[derive(Debug, Serialize)]
struct Overview {
    dirty_markers: usize,
    entries: Vec<CachedEntry>,
}

/// Run the show command.
pub async fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config.store.clone();
    let scan_batch = ctx.config.sync.scan_batch.max(1);
    let overview = blocking(move || collect(connect_store(&config)?, &args, scan_batch)).await?;

    if ctx.output.is_json() {
        ctx.output.json(&overview);
        return Ok(());
    }

    ctx.output.header("Stock cache");
    ctx.output.kv("pending dirty markers", &overview.dirty_markers.to_string());

    if overview.entries.is_empty() {
        return Ok(());
    }
    println!();
    for entry in &overview.entries {
        let stock = match &entry.stock {
            Some(stock) => stock
                .iter()
                .map(|(channel, qty)| format!("{}={}", channel, format_quantity(qty)))
                .collect::<Vec<_>>()
                .join(" "),
            None => "(not cached)".to_string(),
        };
        let dirty = match entry.dirty {
            Some(true) => "dirty",
            _ => "",
        };
        ctx.output.table_row(&[&entry.key, &stock, dirty], &[32, 40, 5]);
    }
    Ok(())
}

fn collect(mut store: RedisStore, args: &ShowArgs, scan_batch: usize) -> Result<Overview> {
    let mut dirty_markers = 0;
    store.scan_each(&keys::dirty_pattern(), scan_batch, |_, batch| {
        dirty_markers += batch.len();
        Ok(())
    })?;

    let mut entries = Vec::new();
    for id in args.variants.iter().copied().map(VariantId::new) {
        entries.push(CachedEntry {
            key: keys::variant_stock_key(id),
            stock: cached::variant_stock(&mut store, id)?,
            dirty: Some(cached::is_dirty(&mut store, id)?),
        });
    }
    for id in args.templates.iter().copied().map(TemplateId::new) {
        entries.push(CachedEntry {
            key: keys::template_stock_key(id),
            stock: cached::template_stock(&mut store, id)?,
            dirty: None,
        });
    }

    Ok(Overview {
        dirty_markers,
        entries,
    })
}
