//! CLI command implementations.

pub mod config;
pub mod flush;
pub mod invalidate;
pub mod mark;
pub mod rebuild;
pub mod reconcile;
pub mod show;
pub mod watch;

use clap::{Args, Subcommand};

/// Arguments for the reconcile command.
#[derive(Args)]
pub struct ReconcileArgs {
    /// Keys examined per scan step (default: [sync].scan_batch).
    #[arg(long)]
    pub scan_batch: Option<usize>,
}

/// Arguments for the rebuild command.
#[derive(Args)]
pub struct RebuildArgs {
    /// Ops per pipelined batch (default: [sync].write_batch).
    #[arg(long)]
    pub write_batch: Option<usize>,
}

/// Arguments for the flush command.
#[derive(Args)]
pub struct FlushArgs {
    /// Extra key pattern to keep, on top of [flush].protected_prefixes.
    #[arg(short, long = "protect")]
    pub protect: Vec<String>,

    /// Keys examined per scan step (default: [flush].batch_size).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the mark command.
#[derive(Args)]
pub struct MarkArgs {
    /// Variant ids to mark dirty.
    #[arg(required = true)]
    pub variants: Vec<u64>,
}

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Variant ids to show.
    #[arg(long = "variant")]
    pub variants: Vec<u64>,

    /// Template ids to show.
    #[arg(long = "template")]
    pub templates: Vec<u64>,
}

/// Arguments for the watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between passes (default: [sync].interval_secs).
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Arguments for the invalidate command.
#[derive(Args)]
pub struct InvalidateArgs {
    /// Product template ids.
    #[arg(short, long = "product")]
    pub products: Vec<u64>,

    /// Category ids.
    #[arg(long = "category")]
    pub categories: Vec<u64>,

    /// URL rewrite ids.
    #[arg(short, long = "rewrite")]
    pub rewrites: Vec<u64>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
