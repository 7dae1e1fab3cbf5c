//! Mark variants dirty by hand.

use anyhow::{Context as _, Result};
use turbo_stock::{DirtyMarker, VariantId};

use super::MarkArgs;
use crate::context::{blocking, connect_store, Context};

/// Run the mark command.
pub async fn run(args: MarkArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config.store.clone();
    let ids: Vec<VariantId> = args.variants.iter().copied().map(VariantId::new).collect();

    // Unlike inline marking, a manual request reports store failures.
    let marked = blocking(move || {
        let store = connect_store(&config)?;
        DirtyMarker::new(store)
            .try_mark(&ids)
            .context("Failed to write dirty markers")
    })
    .await?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "marked": marked }));
        return Ok(());
    }
    ctx.output.success(&format!(
        "Marked {} variant(s) dirty; the next reconcile will refresh them",
        marked
    ));
    Ok(())
}
