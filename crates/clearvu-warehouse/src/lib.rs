//! The ClearVu warehouse: dimension key registry, SCD Type 2 versioning,
//! and fact assembly over any [`WarehouseStore`].
//!
//! A [`Warehouse`] owns the store handle for the lifetime of the process.
//! Open it once at startup and share it (or the components it hands out)
//! between workers; every component is a cheap clone over the same
//! `Arc<S>`.
//!
//! ```rust,ignore
//! let config = WarehouseConfig::load("clearvu.toml")?;
//! let warehouse = Warehouse::open(&config).await?;
//! warehouse.load_date_dimension(start, end, &holidays, today).await?;
//! let fact = warehouse.assembler().assemble(&transaction).await?;
//! ```

pub mod assembler;
pub mod config;
pub mod registry;
pub mod scd;
pub mod telemetry;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clearvu_core::{
  Error, Result,
  date::{DateDimensionGenerator, HolidayCalendar},
  dimension::{
    CustomerAttributes, DimensionKind, ProductAttributes, RepresentativeAttributes,
    SupplierAttributes,
  },
  fact::FactRow,
  operational::{Customer, Payment, Product, Representative, Sale, Supplier},
  store::WarehouseStore,
};
use clearvu_store_sqlite::SqliteStore;
use tracing::info;
use uuid::Uuid;

pub use assembler::FactAssembler;
pub use config::WarehouseConfig;
pub use registry::DimensionRegistry;
pub use scd::{ChangeOutcome, ScdEngine};

pub struct Warehouse<S> {
  store:               Arc<S>,
  dates:               DateDimensionGenerator,
  low_stock_threshold: i64,
}

impl<S> Clone for Warehouse<S> {
  fn clone(&self) -> Self {
    Self {
      store:               Arc::clone(&self.store),
      dates:               self.dates.clone(),
      low_stock_threshold: self.low_stock_threshold,
    }
  }
}

impl Warehouse<SqliteStore> {
  /// Open the SQLite store named by `config` and build a warehouse over it.
  pub async fn open(config: &WarehouseConfig) -> Result<Self> {
    let path = config.resolved_store_path();
    let store = SqliteStore::open(&path).await.map_err(Error::store)?;
    info!(path = %path.display(), "opened warehouse store");
    Self::with_config(Arc::new(store), config)
  }

  /// Release the connection. Components handed out earlier keep the store
  /// alive; in that case the connection closes when the last one drops.
  pub async fn close(self) -> Result<()> {
    match Arc::try_unwrap(self.store) {
      Ok(store) => store.close().await.map_err(Error::store),
      Err(_) => Ok(()),
    }
  }
}

impl<S: WarehouseStore> Warehouse<S> {
  /// A warehouse with the default configuration.
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      dates: DateDimensionGenerator::default(),
      low_stock_threshold: WarehouseConfig::default().low_stock_threshold,
    }
  }

  pub fn with_config(store: Arc<S>, config: &WarehouseConfig) -> Result<Self> {
    Ok(Self {
      store,
      dates: DateDimensionGenerator::new(config.date_dimension())?,
      low_stock_threshold: config.low_stock_threshold,
    })
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn registry(&self) -> DimensionRegistry<S> {
    DimensionRegistry::new(Arc::clone(&self.store))
  }

  pub fn scd(&self) -> ScdEngine<S> { ScdEngine::new(Arc::clone(&self.store)) }

  pub fn assembler(&self) -> FactAssembler<S> {
    FactAssembler::new(Arc::clone(&self.store))
  }

  // ── Date dimension ────────────────────────────────────────────────────

  /// Generate and persist one date row per day in `[start, end]`.
  ///
  /// Re-running over the same range rewrites identical rows.
  pub async fn load_date_dimension(
    &self,
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HolidayCalendar,
    reference_date: NaiveDate,
  ) -> Result<usize> {
    let rows = self.dates.generate(start, end, holidays, reference_date)?;
    let written = self.store.upsert_dates(rows).await.map_err(Error::store)?;
    info!(%start, %end, written, "loaded date dimension");
    Ok(written)
  }

  /// Move the relative "current" flags of the persisted date rows to
  /// `reference_date`.
  pub async fn refresh_date_flags(&self, reference_date: NaiveDate) -> Result<usize> {
    let touched = self
      .store
      .refresh_date_flags(reference_date)
      .await
      .map_err(Error::store)?;
    info!(%reference_date, touched, "refreshed date flags");
    Ok(touched)
  }

  // ── Operational loads ─────────────────────────────────────────────────

  pub async fn load_customer(&self, customer: &Customer, as_of: DateTime<Utc>) -> Result<Uuid> {
    let attributes = CustomerAttributes::try_from(customer)?;
    self
      .registry()
      .resolve_or_create(DimensionKind::Customer, &customer.customer_id, attributes.into(), as_of)
      .await
  }

  /// Stock status is classified against the configured low-stock
  /// threshold.
  pub async fn load_product(&self, product: &Product, as_of: DateTime<Utc>) -> Result<Uuid> {
    let attributes = ProductAttributes::from_product(product, self.low_stock_threshold)?;
    self
      .registry()
      .resolve_or_create(DimensionKind::Product, &product.product_id, attributes.into(), as_of)
      .await
  }

  pub async fn load_representative(
    &self,
    representative: &Representative,
    as_of: DateTime<Utc>,
  ) -> Result<Uuid> {
    let attributes = RepresentativeAttributes::try_from(representative)?;
    self
      .registry()
      .resolve_or_create(
        DimensionKind::Representative,
        &representative.rep_code,
        attributes.into(),
        as_of,
      )
      .await
  }

  pub async fn load_supplier(&self, supplier: &Supplier, as_of: DateTime<Utc>) -> Result<Uuid> {
    let attributes = SupplierAttributes::try_from(supplier)?;
    self
      .registry()
      .resolve_or_create(DimensionKind::Supplier, &supplier.supplier_id, attributes.into(), as_of)
      .await
  }

  /// Assemble one fact per product line of `sale`. A line that fails
  /// leaves the whole sale unrecorded, so the load can simply be retried.
  pub async fn ingest_sale(&self, sale: &Sale) -> Result<Vec<FactRow>> {
    self.assembler().assemble_all(&sale.transactions()?).await
  }

  pub async fn ingest_payment(&self, payment: &Payment) -> Result<FactRow> {
    self.assembler().assemble(&payment.transaction()?).await
  }
}

#[cfg(test)]
mod tests;
