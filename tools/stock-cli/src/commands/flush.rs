//! Purge the store, keeping protected keys.

use anyhow::{bail, Result};
use dialoguer::Confirm;
use turbo_cache::flush_except_protected;

use super::FlushArgs;
use crate::context::{blocking, connect_store, Context};

/// Run the flush command.
pub async fn run(args: FlushArgs, ctx: &Context) -> Result<()> {
    let mut protected = ctx.config.flush.protected_prefixes.clone();
    for pattern in &args.protect {
        protected = protected.with(pattern);
    }
    let batch_size = args.batch_size.unwrap_or(ctx.config.flush.batch_size);

    ctx.output.header("Flush stock cache store");
    ctx.output.info("Keys with these prefixes are kept:");
    for prefix in protected.prefixes() {
        ctx.output.list_item(prefix);
    }

    if !args.yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt("Delete every other key?")
            .default(false)
            .interact()?;
        if !confirmed {
            bail!("Flush cancelled");
        }
    }

    let config = ctx.config.store.clone();
    let spinner = ctx.output.spinner("Flushing...");
    let result = blocking(move || {
        let mut store = connect_store(&config)?;
        Ok(flush_except_protected(&mut store, &protected, batch_size)?)
    })
    .await;
    spinner.finish_and_clear();
    let report = result?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.success(&format!(
        "Deleted {} of {} key(s) scanned",
        report.deleted, report.scanned
    ));
    Ok(())
}
