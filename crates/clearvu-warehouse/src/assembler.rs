//! Fact assembly.
//!
//! Turns a source [`Transaction`] into an immutable [`FactRow`]: validates
//! the enumerated strings and measures, resolves every dimension to the
//! version effective on the transaction date, and appends the row. Facts
//! are never updated; corrections go in as offsetting rows via
//! [`FactAssembler::reverse`].
//!
//! [`prepare`](FactAssembler::prepare) does everything but the write, so a
//! batch of transactions can be checked in full before any of it is
//! recorded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clearvu_core::{
  Error, Result,
  date::date_key,
  dimension::DimensionKind,
  fact::{
    DimensionKeys, DimensionRole, FactRow, Measures, PaymentStatus, Transaction,
    TransactionType,
  },
  store::WarehouseStore,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::DimensionRegistry;

pub struct FactAssembler<S> {
  registry: DimensionRegistry<S>,
}

impl<S> Clone for FactAssembler<S> {
  fn clone(&self) -> Self {
    Self { registry: self.registry.clone() }
  }
}

impl<S: WarehouseStore> FactAssembler<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { registry: DimensionRegistry::new(store) }
  }

  /// Validate, resolve and append one fact row for `tx`.
  ///
  /// Assembling the same transaction twice appends two rows; use
  /// [`facts_for_transaction`](Self::facts_for_transaction) to detect
  /// duplicates.
  pub async fn assemble(&self, tx: &Transaction) -> Result<FactRow> {
    let fact = self.prepare(tx).await?;
    self.store().append_fact(fact.clone()).await.map_err(Error::store)?;
    info!(
      fact_id = %fact.fact_id,
      transaction_id = %fact.source_transaction_id,
      transaction_type = %fact.transaction_type,
      net_amount = fact.measures.net_amount,
      "assembled fact"
    );
    Ok(fact)
  }

  /// Assemble every transaction in `txs` or none of them.
  ///
  /// All rows are prepared first; the first failure returns before
  /// anything is written, and the rows are then appended in one atomic
  /// store call.
  pub async fn assemble_all(&self, txs: &[Transaction]) -> Result<Vec<FactRow>> {
    let mut facts = Vec::with_capacity(txs.len());
    for tx in txs {
      facts.push(self.prepare(tx).await?);
    }

    let written = self
      .store()
      .append_facts(facts.clone())
      .await
      .map_err(Error::store)?;
    info!(written, "assembled fact batch");
    Ok(facts)
  }

  /// Validate `tx` and resolve its dimension keys without recording
  /// anything.
  pub async fn prepare(&self, tx: &Transaction) -> Result<FactRow> {
    let transaction_type = TransactionType::parse(&tx.transaction_type)?;
    let payment_status = PaymentStatus::parse(&tx.payment_status)?;
    let measures = Measures::compute(
      tx.quantity,
      tx.unit_price,
      tx.discount_amount,
      tx.payment_amount,
      transaction_type,
    )?;

    let keys = self.resolve_keys(tx).await?;

    Ok(FactRow {
      fact_id: Uuid::new_v4(),
      source_transaction_id: tx.transaction_id.clone(),
      keys,
      measures,
      transaction_type,
      payment_method: tx.payment_method.clone(),
      payment_status,
      transaction_date: tx.date,
      payment_date: tx.payment_date,
      sales_id: tx.sales_id.clone(),
      payment_id: tx.payment_id.clone(),
      reverses: None,
      recorded_at: Utc::now(),
    })
  }

  /// Append a row cancelling `fact_id`. Summed with the original, every
  /// additive measure comes out at zero.
  pub async fn reverse(&self, fact_id: Uuid) -> Result<FactRow> {
    let original = self
      .store()
      .get_fact(fact_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::FactNotFound(fact_id))?;

    let reversal = original.reversal(Utc::now());
    self
      .store()
      .append_fact(reversal.clone())
      .await
      .map_err(Error::store)?;
    info!(fact_id = %reversal.fact_id, reverses = %fact_id, "reversed fact");
    Ok(reversal)
  }

  /// Every fact row recorded for a source transaction, in append order.
  pub async fn facts_for_transaction(&self, transaction_id: &str) -> Result<Vec<FactRow>> {
    self
      .store()
      .facts_for_transaction(transaction_id)
      .await
      .map_err(Error::store)
  }

  fn store(&self) -> &S { self.registry.store() }

  async fn resolve_keys(&self, tx: &Transaction) -> Result<DimensionKeys> {
    let customer_key = self
      .resolve_required(DimensionRole::Customer, DimensionKind::Customer, &tx.customer_id, tx.date)
      .await?;
    let product_key = self
      .resolve_required(DimensionRole::Product, DimensionKind::Product, &tx.product_id, tx.date)
      .await?;
    let representative_key = self
      .resolve_required(
        DimensionRole::Representative,
        DimensionKind::Representative,
        &tx.representative_id,
        tx.date,
      )
      .await?;

    let day = tx.date.date_naive();
    let date_key = date_key(day).ok_or_else(|| Error::DimensionNotFound {
      role:       DimensionRole::Date,
      natural_id: day.to_string(),
    })?;
    if self.store().get_date(date_key).await.map_err(Error::store)?.is_none() {
      return Err(Error::DimensionNotFound {
        role:       DimensionRole::Date,
        natural_id: date_key.to_string(),
      });
    }

    let supplier_key = match &tx.supplier_id {
      Some(supplier_id) => self.resolve_supplier(supplier_id, tx.date).await?,
      None => None,
    };

    Ok(DimensionKeys {
      customer_key,
      product_key,
      representative_key,
      date_key,
      supplier_key,
    })
  }

  async fn resolve_required(
    &self,
    role: DimensionRole,
    kind: DimensionKind,
    natural_id: &str,
    at: DateTime<Utc>,
  ) -> Result<Uuid> {
    match self.registry.resolve_as_of(kind, natural_id, at).await {
      Ok(key) => Ok(key),
      Err(Error::NotFound { .. } | Error::NoCoverage { .. }) => {
        Err(Error::DimensionNotFound { role, natural_id: natural_id.to_owned() })
      }
      Err(e) => Err(e),
    }
  }

  // The supplier is optional context; a miss leaves the key empty.
  async fn resolve_supplier(
    &self,
    supplier_id: &str,
    at: DateTime<Utc>,
  ) -> Result<Option<Uuid>> {
    match self
      .registry
      .resolve_as_of(DimensionKind::Supplier, supplier_id, at)
      .await
    {
      Ok(key) => {
        debug!(supplier_id, %key, "resolved supplier");
        Ok(Some(key))
      }
      Err(e @ (Error::NotFound { .. } | Error::NoCoverage { .. })) => {
        warn!(supplier_id, error = %e, "supplier not resolved; leaving supplier_key empty");
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }
}
