//! CDN cache invalidation.

use std::collections::BTreeSet;

use anyhow::{bail, Context as _, Result};
use tracing::debug;
use turbo_stock::{
    CacheTag, CategoryId, HttpNotifier, InvalidationKey, Notifier, RewriteId, TemplateId,
};

use super::InvalidateArgs;
use crate::context::{blocking, Context};

/// Run the invalidate command.
pub async fn run(args: InvalidateArgs, ctx: &Context) -> Result<()> {
    let tags = tags(&args);
    if tags.is_empty() {
        bail!("Nothing to invalidate. Pass --product, --category or --rewrite.");
    }

    let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
    let config = ctx.config.invalidation.clone();

    // The blocking HTTP client must be created and dropped off the runtime.
    let sent = blocking(move || {
        let Some(notifier) = HttpNotifier::from_config(&config)
            .context("Invalid [invalidation] settings")?
        else {
            return Ok(false);
        };
        debug!(tags = tags.len(), "sending cache invalidation");
        notifier
            .notify(&tags)
            .context("Cache invalidation request failed")?;
        Ok(true)
    })
    .await?;

    if !sent {
        bail!("Cache invalidation is disabled. Set enabled, url and key in [invalidation].");
    }

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "tags": rendered }));
        return Ok(());
    }
    ctx.output.success(&format!("Invalidated {}", rendered.join(", ")));
    Ok(())
}

/// Generate and print a new shared key.
pub async fn generate_key(ctx: &Context) -> Result<()> {
    let key = InvalidationKey::generate();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "key": key.as_str() }));
        return Ok(());
    }
    println!("{}", key);
    ctx.output.info("Set it as `key` in [invalidation] and on the CDN side.");
    Ok(())
}

/// Requested tags, each sent once.
fn tags(args: &InvalidateArgs) -> Vec<CacheTag> {
    args.products
        .iter()
        .map(|id| CacheTag::Product(TemplateId::new(*id)))
        .chain(args.categories.iter().map(|id| CacheTag::Category(CategoryId::new(*id))))
        .chain(args.rewrites.iter().map(|id| CacheTag::Rewrite(RewriteId::new(*id))))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
