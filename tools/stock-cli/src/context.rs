//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use turbo_cache::{RedisStore, StoreConfig};
use turbo_stock::Catalog;

use crate::config::StockConfig;
use crate::output::Output;

/// Config file names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["stock.toml", ".stock.toml", "stock.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Stock cache configuration.
    pub config: StockConfig,
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => {
                let path = PathBuf::from(path);
                (StockConfig::load(&path)?, Some(path))
            }
            None => match find_config(&cwd)? {
                Some((path, config)) => (config, Some(path)),
                None => (StockConfig::default(), None),
            },
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Load the catalog snapshot named in `[source]`.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let path = self.catalog_path()?;
        Catalog::load(&path).with_context(|| format!("Failed to load catalog: {}", path.display()))
    }

    /// Path of the catalog snapshot, relative to the config file's directory.
    pub fn catalog_path(&self) -> Result<PathBuf> {
        let Some(path) = &self.config.source.path else {
            bail!("No catalog configured. Set `path` in the [source] section.");
        };
        let base = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(&self.cwd);
        Ok(resolve_path(base, path))
    }

    /// Where `config init` writes.
    pub fn default_config_path(&self) -> PathBuf {
        self.cwd.join(CONFIG_NAMES[0])
    }
}

/// Find config file in directory tree.
pub fn find_config(start: &Path) -> Result<Option<(PathBuf, StockConfig)>> {
    for dir in start.ancestors() {
        for name in &CONFIG_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                let config = StockConfig::load(&path)?;
                return Ok(Some((path, config)));
            }
        }
    }
    Ok(None)
}

/// Resolve `path` against `base` unless it is absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Open the store and verify it answers. Dials the server, so call it
/// from inside [`blocking`].
pub fn connect_store(config: &StoreConfig) -> Result<RedisStore> {
    RedisStore::connect(config).context("Failed to connect to the stock cache store")
}

/// Run blocking store or HTTP work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Background task failed")?
}
