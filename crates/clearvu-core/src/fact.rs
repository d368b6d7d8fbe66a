//! Fact types — the measured side of the star schema.
//!
//! A fact row records one sales/payment transaction. It references each
//! dimension by surrogate key only and is never updated once written;
//! corrections are expressed as offsetting rows (see [`FactRow::reversal`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
  Sale,
  Payment,
  /// A sale settled in the same transaction.
  Both,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Completed,
  Failed,
  Cancelled,
}

/// The role a dimension plays in a fact row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DimensionRole {
  Customer,
  Product,
  Representative,
  Supplier,
  Date,
}

impl TransactionType {
  pub fn parse(value: &str) -> Result<Self> {
    value.parse().map_err(|_| Error::InvalidEnumValue {
      field: "transaction_type",
      value: value.to_owned(),
    })
  }
}

impl PaymentStatus {
  pub fn parse(value: &str) -> Result<Self> {
    value.parse().map_err(|_| Error::InvalidEnumValue {
      field: "payment_status",
      value: value.to_owned(),
    })
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// A record from the transaction feed. Enumerated fields arrive as raw
/// strings and are validated during assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
  /// Identifier of the source transaction; not unique across fact rows.
  pub transaction_id:    String,
  pub customer_id:       String,
  pub product_id:        String,
  pub representative_id: String,
  pub supplier_id:       Option<String>,
  pub date:              DateTime<Utc>,
  pub quantity:          i64,
  pub unit_price:        f64,
  #[serde(default)]
  pub discount_amount:   f64,
  pub payment_amount:    f64,
  pub payment_method:    Option<String>,
  pub payment_status:    String,
  pub transaction_type:  String,
  #[serde(default)]
  pub payment_date:      Option<DateTime<Utc>>,
  #[serde(default)]
  pub sales_id:          Option<String>,
  #[serde(default)]
  pub payment_id:        Option<String>,
}

// ─── Measures ────────────────────────────────────────────────────────────────

/// The validated numeric part of a fact row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measures {
  pub quantity_sold:      i64,
  pub unit_price:         f64,
  pub total_sales_amount: f64,
  pub discount_amount:    f64,
  pub payment_amount:     f64,
  /// Always `total_sales_amount - discount_amount`.
  pub net_amount:         f64,
}

impl Measures {
  /// Validate the raw numbers of a transaction and derive the totals.
  ///
  /// A `payment` transaction must carry a positive payment amount; `sale`
  /// and `both` accept any non-negative amount.
  pub fn compute(
    quantity: i64,
    unit_price: f64,
    discount_amount: f64,
    payment_amount: f64,
    transaction_type: TransactionType,
  ) -> Result<Self> {
    for (name, value) in [
      ("unit_price", unit_price),
      ("discount_amount", discount_amount),
      ("payment_amount", payment_amount),
    ] {
      if !value.is_finite() {
        return Err(Error::InvalidMeasure(format!("{name} is not finite")));
      }
      if value < 0.0 {
        return Err(Error::InvalidMeasure(format!(
          "{name} must not be negative, got {value}"
        )));
      }
    }
    if quantity < 0 {
      return Err(Error::InvalidMeasure(format!(
        "quantity must not be negative, got {quantity}"
      )));
    }

    let total_sales_amount = quantity as f64 * unit_price;
    if !total_sales_amount.is_finite() {
      return Err(Error::InvalidMeasure(format!(
        "total sales amount of {quantity} x {unit_price} is not finite"
      )));
    }
    if discount_amount > total_sales_amount {
      return Err(Error::InvalidMeasure(format!(
        "discount {discount_amount} exceeds total sales amount {total_sales_amount}"
      )));
    }
    if transaction_type == TransactionType::Payment && payment_amount <= 0.0 {
      return Err(Error::InvalidMeasure(
        "payment transactions require a positive payment_amount".into(),
      ));
    }

    Ok(Self {
      quantity_sold: quantity,
      unit_price,
      total_sales_amount,
      discount_amount,
      payment_amount,
      net_amount: total_sales_amount - discount_amount,
    })
  }

  /// The measures that cancel `self` when summed with it.
  pub fn negated(&self) -> Self {
    Self {
      quantity_sold:      -self.quantity_sold,
      unit_price:         self.unit_price,
      total_sales_amount: -self.total_sales_amount,
      discount_amount:    -self.discount_amount,
      payment_amount:     -self.payment_amount,
      net_amount:         -self.net_amount,
    }
  }
}

// ─── Fact row ────────────────────────────────────────────────────────────────

/// Surrogate keys of the dimension versions effective at the transaction
/// date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionKeys {
  pub customer_key:       Uuid,
  pub product_key:        Uuid,
  pub representative_key: Uuid,
  pub date_key:           u32,
  pub supplier_key:       Option<Uuid>,
}

/// One immutable row of the sales/payment fact table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
  pub fact_id:               Uuid,
  pub source_transaction_id: String,
  pub keys:                  DimensionKeys,
  pub measures:              Measures,
  pub transaction_type:      TransactionType,
  pub payment_method:        Option<String>,
  pub payment_status:        PaymentStatus,
  pub transaction_date:      DateTime<Utc>,
  pub payment_date:          Option<DateTime<Utc>>,
  pub sales_id:              Option<String>,
  pub payment_id:            Option<String>,
  /// Set on offsetting rows: the fact this row cancels.
  pub reverses:              Option<Uuid>,
  /// Assigned at assembly; never changes.
  pub recorded_at:           DateTime<Utc>,
}

impl FactRow {
  /// An offsetting row that cancels `self`: same keys and context, negated
  /// measures.
  pub fn reversal(&self, recorded_at: DateTime<Utc>) -> Self {
    Self {
      fact_id: Uuid::new_v4(),
      source_transaction_id: self.source_transaction_id.clone(),
      keys: self.keys,
      measures: self.measures.negated(),
      transaction_type: self.transaction_type,
      payment_method: self.payment_method.clone(),
      payment_status: self.payment_status,
      transaction_date: self.transaction_date,
      payment_date: self.payment_date,
      sales_id: self.sales_id.clone(),
      payment_id: self.payment_id.clone(),
      reverses: Some(self.fact_id),
      recorded_at,
    }
  }
}
