//! Full rebuild of the stock cache.

use anyhow::Result;
use turbo_stock::StockSync;

use super::RebuildArgs;
use crate::context::{blocking, connect_store, Context};
use crate::output::format_millis;

/// Run the rebuild command.
pub async fn run(args: RebuildArgs, ctx: &Context) -> Result<()> {
    let mut options = ctx.config.sync.options();
    if let Some(write_batch) = args.write_batch {
        options.write_batch = write_batch;
    }

    let catalog = ctx.load_catalog()?;
    let config = ctx.config.store.clone();
    ctx.output.debug(&format!(
        "Rebuilding from {} in batches of {}",
        ctx.catalog_path()?.display(),
        options.write_batch
    ));

    let spinner = ctx.output.spinner("Rebuilding stock cache...");
    let result = blocking(move || {
        let store = connect_store(&config)?;
        let report = StockSync::new(store, catalog)
            .with_options(options)
            .rebuild_all()?;
        Ok(report)
    })
    .await;
    spinner.finish_and_clear();
    let report = result?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    ctx.output.success(&format!("Stock cache rebuilt in {}", format_millis(elapsed)));
    ctx.output.kv("variants", &report.variants_written.to_string());
    ctx.output.kv("templates", &report.templates_written.to_string());
    ctx.output.kv("stale keys pruned", &report.pruned.to_string());
    ctx.output.kv("batches", &report.batches.to_string());

    Ok(())
}
