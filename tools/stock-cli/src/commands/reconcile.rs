//! Reconcile dirty variants.

use anyhow::Result;
use turbo_cache::RedisStore;
use turbo_stock::{Catalog, ReconcileReport, StockSync, SyncOptions};

use super::ReconcileArgs;
use crate::context::{blocking, connect_store, Context};
use crate::output::{format_millis, Output};

/// Run the reconcile command.
pub async fn run(args: ReconcileArgs, ctx: &Context) -> Result<()> {
    let mut options = ctx.config.sync.options();
    if let Some(scan_batch) = args.scan_batch {
        options.scan_batch = scan_batch;
    }

    let catalog = ctx.load_catalog()?;
    let config = ctx.config.store.clone();

    let spinner = ctx.output.spinner("Reconciling dirty stock...");
    let report = blocking(move || {
        let store = connect_store(&config)?;
        reconcile_once(store, catalog, options)
    })
    .await;
    spinner.finish_and_clear();

    print_report(&ctx.output, &report?);
    Ok(())
}

/// One reconciliation pass with owned handles.
pub fn reconcile_once(
    store: RedisStore,
    catalog: Catalog,
    options: SyncOptions,
) -> Result<ReconcileReport> {
    let report = StockSync::new(store, catalog)
        .with_options(options)
        .reconcile_dirty()?;
    Ok(report)
}

pub fn print_report(output: &Output, report: &ReconcileReport) {
    if output.is_json() {
        output.json(report);
        return;
    }

    for key in &report.malformed_keys {
        output.warn(&format!("Skipped malformed marker: {}", key));
    }

    if report.is_noop() {
        output.success("Nothing to reconcile");
        return;
    }

    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    output.success(&format!(
        "Reconciled {} dirty marker(s) in {}",
        report.markers_found,
        format_millis(elapsed)
    ));
    output.kv("variants written", &report.variants_written.to_string());
    output.kv("templates written", &report.templates_written.to_string());
    if report.variants_removed > 0 {
        output.kv("variants removed", &report.variants_removed.to_string());
    }
    if report.templates_removed > 0 {
        output.kv("templates removed", &report.templates_removed.to_string());
    }
    output.kv("markers cleared", &report.markers_cleared.to_string());
    if report.attempts > 1 {
        output.kv("attempts", &report.attempts.to_string());
    }
}
