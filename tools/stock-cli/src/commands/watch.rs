//! Reconcile on a fixed interval.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use turbo_cache::RedisStore;

use super::reconcile::{print_report, reconcile_once};
use super::WatchArgs;
use crate::context::{blocking, Context};

/// Run the watch command.
///
/// Passes never overlap: the next tick is only awaited once the previous
/// pass has returned. A failed pass is logged and retried on the next tick.
pub async fn run(args: WatchArgs, ctx: &Context) -> Result<()> {
    let secs = args.interval.unwrap_or(ctx.config.sync.interval_secs);
    if secs == 0 {
        bail!("Interval must be at least one second");
    }
    // Fail fast on a bad address or catalog before entering the loop.
    ctx.config.store.connection_info()?;
    ctx.catalog_path()?;

    ctx.output.info(&format!(
        "Reconciling every {}s, press Ctrl-C to stop",
        secs
    ));

    let passes = run_loop(Duration::from_secs(secs), tokio::signal::ctrl_c(), |pass| async move {
        match run_pass(ctx).await {
            Ok(report) => {
                if !report.is_noop() || ctx.output.is_json() {
                    print_report(&ctx.output, &report);
                }
            }
            Err(e) => {
                error!(pass, error = %format!("{:#}", e), "reconciliation pass failed");
                ctx.output.warn(&format!("Pass {} failed: {:#}", pass, e));
            }
        }
    })
    .await;

    info!(passes, "watch stopped");
    ctx.output.success(&format!("Stopped after {} pass(es)", passes));
    Ok(())
}

/// Tick until `shutdown` resolves, running one pass per tick.
///
/// `shutdown` is polled across passes, so a signal that arrives while a
/// pass runs stops the loop before the next one starts.
async fn run_loop<S, P, F>(period: Duration, shutdown: S, mut pass: P) -> u64
where
    S: Future,
    P: FnMut(u64) -> F,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut passes = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        passes += 1;
        pass(passes).await;
    }
    passes
}

async fn run_pass(ctx: &Context) -> Result<turbo_stock::ReconcileReport> {
    // The catalog is re-read every pass so edits to the snapshot are picked up.
    let catalog = ctx.load_catalog()?;
    let store = RedisStore::open(&ctx.config.store)?;
    let options = ctx.config.sync.options();
    blocking(move || reconcile_once(store, catalog, options)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_shutdown_during_pass_stops_before_next_tick() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);

        let passes = run_loop(Duration::from_millis(5), rx, |pass| {
            if pass == 2 {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }
            async {}
        })
        .await;

        assert_eq!(passes, 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick_runs_nothing() {
        let passes = run_loop(Duration::from_secs(60), async {}, |_| async {}).await;
        assert_eq!(passes, 0);
    }
}
