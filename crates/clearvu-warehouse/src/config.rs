//! Warehouse configuration.
//!
//! Read from an optional TOML file, then overridden by `CLEARVU_*`
//! environment variables (e.g. `CLEARVU_STORE_PATH`).

use std::path::{Path, PathBuf};

use clearvu_core::{
  Error, Result,
  date::{DateDimensionConfig, DateDimensionGenerator},
  operational::DEFAULT_LOW_STOCK_THRESHOLD,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WarehouseConfig {
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path:              PathBuf,
  /// Calendar month (1–12) in which the fiscal year starts.
  #[serde(default = "default_fiscal_year_start_month")]
  pub fiscal_year_start_month: u32,
  /// Stock level at or below which a product is classified low on stock.
  #[serde(default = "default_low_stock_threshold")]
  pub low_stock_threshold:     i64,
}

fn default_fiscal_year_start_month() -> u32 { 1 }

fn default_low_stock_threshold() -> i64 { DEFAULT_LOW_STOCK_THRESHOLD }

impl WarehouseConfig {
  /// Load from `path` (if it exists) and the environment.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .set_default("store_path", "clearvu.db")
      .map_err(invalid)?
      .add_source(config::File::from(path.as_ref()).required(false))
      .add_source(config::Environment::with_prefix("CLEARVU").try_parsing(true))
      .build()
      .map_err(invalid)?;

    let config: Self = settings.try_deserialize().map_err(invalid)?;
    DateDimensionGenerator::new(config.date_dimension())?;
    Ok(config)
  }

  /// The store path with `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn date_dimension(&self) -> DateDimensionConfig {
    DateDimensionConfig { fiscal_year_start_month: self.fiscal_year_start_month }
  }
}

impl Default for WarehouseConfig {
  fn default() -> Self {
    Self {
      store_path:              PathBuf::from("clearvu.db"),
      fiscal_year_start_month: default_fiscal_year_start_month(),
      low_stock_threshold:     default_low_stock_threshold(),
    }
  }
}

fn invalid(err: config::ConfigError) -> Error { Error::InvalidConfig(err.to_string()) }

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
