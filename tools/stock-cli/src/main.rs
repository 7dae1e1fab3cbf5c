//! Stock CLI - administrative tool for the TurboCommerce stock cache.
//!
//! Commands:
//! - `turbo-stock reconcile` - Recompute dirty variants (run by the scheduler)
//! - `turbo-stock rebuild` - Recompute every variant and template
//! - `turbo-stock flush` - Purge the store, keeping protected keys
//! - `turbo-stock mark` - Mark variants dirty by hand
//! - `turbo-stock show` - Inspect cached stock and pending markers
//! - `turbo-stock watch` - Reconcile on a fixed interval
//! - `turbo-stock invalidate` - Send CDN cache-invalidation tags
//! - `turbo-stock invalidation-key` - Generate a shared invalidation key
//! - `turbo-stock config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use commands::{
    ConfigArgs, FlushArgs, InvalidateArgs, MarkArgs, ReconcileArgs, RebuildArgs, ShowArgs,
    WatchArgs,
};

/// Stock CLI - Keep the storefront stock cache in sync
#[derive(Parser)]
#[command(name = "turbo-stock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Redis host, overriding [store].host
    #[arg(long, global = true, env = "TURBO_STOCK_REDIS_HOST")]
    redis_host: Option<String>,

    /// Redis port, overriding [store].port
    #[arg(long, global = true, env = "TURBO_STOCK_REDIS_PORT")]
    redis_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute stock of dirty variants
    Reconcile(ReconcileArgs),

    /// Recompute stock of every variant and template
    Rebuild(RebuildArgs),

    /// Delete every unprotected key from the store
    Flush(FlushArgs),

    /// Mark variants dirty
    Mark(MarkArgs),

    /// Show cached stock
    Show(ShowArgs),

    /// Reconcile periodically until interrupted
    Watch(WatchArgs),

    /// Send cache-invalidation tags to the CDN
    Invalidate(InvalidateArgs),

    /// Generate a random cache-invalidation key
    InvalidationKey,

    /// Manage configuration
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let mut ctx = match context::Context::load(config_path, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };
    ctx.config.apply_overrides(cli.redis_host, cli.redis_port);

    // Execute command
    let result = match cli.command {
        Commands::Reconcile(args) => commands::reconcile::run(args, &ctx).await,
        Commands::Rebuild(args) => commands::rebuild::run(args, &ctx).await,
        Commands::Flush(args) => commands::flush::run(args, &ctx).await,
        Commands::Mark(args) => commands::mark::run(args, &ctx).await,
        Commands::Show(args) => commands::show::run(args, &ctx).await,
        Commands::Watch(args) => commands::watch::run(args, &ctx).await,
        Commands::Invalidate(args) => commands::invalidate::run(args, &ctx).await,
        Commands::InvalidationKey => commands::invalidate::generate_key(&ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
