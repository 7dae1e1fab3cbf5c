//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, StockConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    // Never echo secrets.
    let mut config = ctx.config.clone();
    if config.store.password.is_some() {
        config.store.password = Some("********".to_string());
    }
    if config.invalidation.key.is_some() {
        config.invalidation.key = Some("********".to_string());
    }

    if ctx.output.is_json() {
        ctx.output.json(&config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(none found, using defaults)"),
    }

    ctx.output.info("");
    ctx.output.info("[store]");
    ctx.output.kv("host", config.store.host.as_deref().unwrap_or("(unset)"));
    ctx.output.kv(
        "port",
        &config.store.port.map_or("(unset)".to_string(), |p| p.to_string()),
    );
    ctx.output.kv("db", &config.store.db.to_string());
    if let Some(ref user) = config.store.username {
        ctx.output.kv("username", user);
    }
    if let Some(ref password) = config.store.password {
        ctx.output.kv("password", password);
    }
    ctx.output.kv("connect_timeout_ms", &config.store.connect_timeout_ms.to_string());
    ctx.output.kv("io_timeout_ms", &config.store.io_timeout_ms.to_string());

    ctx.output.info("");
    ctx.output.info("[flush]");
    ctx.output.kv("batch_size", &config.flush.batch_size.to_string());
    ctx.output.kv("protected_prefixes", "");
    for prefix in config.flush.protected_prefixes.prefixes() {
        ctx.output.list_item(prefix);
    }

    ctx.output.info("");
    ctx.output.info("[sync]");
    ctx.output.kv("scan_batch", &config.sync.scan_batch.to_string());
    ctx.output.kv("write_batch", &config.sync.write_batch.to_string());
    ctx.output.kv("interval_secs", &config.sync.interval_secs.to_string());

    ctx.output.info("");
    ctx.output.info("[source]");
    match ctx.catalog_path() {
        Ok(path) => ctx.output.kv("path", &path.display().to_string()),
        Err(_) => ctx.output.kv("path", "(unset)"),
    }

    ctx.output.info("");
    ctx.output.info("[invalidation]");
    ctx.output.kv("enabled", &config.invalidation.enabled.to_string());
    if let Some(ref url) = config.invalidation.url {
        ctx.output.kv("url", url);
    }
    if let Some(ref key) = config.invalidation.key {
        ctx.output.kv("key", key);
    }
    ctx.output.kv("timeout_ms", &config.invalidation.timeout_ms.to_string());

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.default_config_path();

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = check(ctx);

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Errors and warnings for the loaded configuration.
fn check(ctx: &Context) -> (Vec<String>, Vec<String>) {
    let config: &StockConfig = &ctx.config;
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = config.store.connection_info() {
        errors.push(format!("store: {}", e));
    }
    if config.store.connect_timeout_ms == 0 || config.store.io_timeout_ms == 0 {
        errors.push("store timeouts must be greater than zero".to_string());
    }

    if config.flush.batch_size == 0 {
        errors.push("flush.batch_size must be greater than zero".to_string());
    }
    if config.flush.protected_prefixes.prefixes().is_empty() {
        warnings.push("flush.protected_prefixes is empty; flush will delete carts and stock".to_string());
    }
    for required in ["product-stock-", "product-stock-is-dirty-"] {
        if !config.flush.protected_prefixes.is_protected(required) {
            warnings.push(format!(
                "flush.protected_prefixes does not keep `{}` keys",
                required
            ));
        }
    }

    if config.sync.scan_batch == 0 || config.sync.write_batch == 0 {
        errors.push("sync batch sizes must be greater than zero".to_string());
    }
    if config.sync.interval_secs == 0 {
        errors.push("sync.interval_secs must be greater than zero".to_string());
    }

    match ctx.catalog_path() {
        Ok(path) if !path.exists() => {
            warnings.push(format!("source.path {} does not exist", path.display()))
        }
        Ok(_) => {}
        Err(_) => warnings.push("source.path is not set; reconcile and rebuild need it".to_string()),
    }

    let invalidation = &config.invalidation;
    if invalidation.enabled {
        if invalidation.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            errors.push("invalidation.url is required when invalidation is enabled".to_string());
        }
        if invalidation.key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            errors.push("invalidation.key is required when invalidation is enabled".to_string());
        }
    }

    (errors, warnings)
}
