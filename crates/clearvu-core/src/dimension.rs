//! Dimension types — the descriptive side of the star schema.
//!
//! Every dimension except the calendar is a Slowly Changing Dimension of
//! Type 2: a change to an entity never overwrites its row. Instead the current
//! row is expired and a new version is inserted, each version carrying its own
//! surrogate key and a half-open `[effective_date, expiration_date)` interval.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The versioned dimensions. The date dimension is handled separately in
/// [`crate::date`] because its rows are immutable.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DimensionKind {
  Customer,
  Product,
  Representative,
  Supplier,
}

// ─── Enumerated attribute values ─────────────────────────────────────────────

/// Inventory status derived from a product's stock level.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockStatus {
  InStock,
  LowStock,
  OutOfStock,
}

impl StockStatus {
  /// Classify a stock level; anything at or below `low_threshold` (but above
  /// zero) is low.
  pub fn classify(stock_level: i64, low_threshold: i64) -> Self {
    if stock_level <= 0 {
      Self::OutOfStock
    } else if stock_level <= low_threshold {
      Self::LowStock
    } else {
      Self::InStock
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RepresentativeStatus {
  #[default]
  Active,
  Inactive,
  Terminated,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartnershipStatus {
  #[default]
  Active,
  Inactive,
  Suspended,
}

// ─── Attribute snapshots ─────────────────────────────────────────────────────

/// Descriptive customer attributes as they stood during one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAttributes {
  pub name:                 String,
  pub email:                String,
  pub category:             String,
  pub customer_category:    String,
  pub credit_limit:         f64,
  pub discount_percentage:  f64,
  pub normal_payment_terms: String,
  pub settle_terms:         String,
  pub region_code:          i64,
  /// Derived from `region_code` when a region directory is available.
  pub region_name:          Option<String>,
  /// The representative normally serving this customer.
  pub rep_code:             Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
  pub name:                String,
  pub description:         String,
  pub brand:               String,
  pub category:            String,
  pub price:               f64,
  pub cost:                Option<f64>,
  /// `(price - cost) / price`; absent without a cost or a positive price.
  pub margin:              Option<f64>,
  pub stock_level:         i64,
  pub stock_status:        StockStatus,
  pub product_category:    String,
  pub product_subcategory: Option<String>,
  pub product_line:        Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeAttributes {
  pub rep_description:       String,
  pub rep_name:              Option<String>,
  pub rep_title:             Option<String>,
  pub commission_method:     String,
  pub commission_percentage: f64,
  /// bronze, silver, gold, platinum.
  pub commission_tier:       Option<String>,
  pub territory:             Option<String>,
  pub region:                Option<String>,
  pub status:                RepresentativeStatus,
  pub hire_date:             Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierAttributes {
  pub name:                 String,
  pub supplier_description: String,
  pub contact_name:         String,
  pub contact_email:        String,
  pub phone:                String,
  pub address:              String,
  pub city:                 String,
  pub country:              String,
  pub postal_code:          String,
  pub region:               Option<String>,
  pub products_supplied:    i64,
  /// Letter grade, A through D.
  pub supplier_rating:      Option<String>,
  /// 1–100.
  pub reliability_score:    Option<u8>,
  pub supplier_type:        Option<String>,
  pub supplier_tier:        Option<String>,
  pub partnership_status:   PartnershipStatus,
  pub contract_start_date:  Option<NaiveDate>,
  pub contract_end_date:    Option<NaiveDate>,
  pub preferred_supplier:   bool,
}

/// A typed attribute snapshot. The variant determines the dimension kind and
/// is stored as the `kind` column; the payload is stored as JSON.
///
/// Every field of a snapshot is tracked: two snapshots describe the same
/// version iff they compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DimensionAttributes {
  Customer(CustomerAttributes),
  Product(ProductAttributes),
  Representative(RepresentativeAttributes),
  Supplier(SupplierAttributes),
}

impl DimensionAttributes {
  pub fn kind(&self) -> DimensionKind {
    match self {
      Self::Customer(_) => DimensionKind::Customer,
      Self::Product(_) => DimensionKind::Product,
      Self::Representative(_) => DimensionKind::Representative,
      Self::Supplier(_) => DimensionKind::Supplier,
    }
  }

  /// Fail with [`Error::KindMismatch`] unless this snapshot belongs to
  /// `expected`.
  pub fn ensure_kind(&self, expected: DimensionKind) -> Result<()> {
    let supplied = self.kind();
    if supplied == expected {
      Ok(())
    } else {
      Err(Error::KindMismatch { expected, supplied })
    }
  }

  /// Serialise the inner payload (without the kind tag) for the
  /// `attributes_json` column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from the stored kind and JSON payload.
  pub fn from_parts(kind: DimensionKind, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "kind": kind.as_ref(), "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

impl From<CustomerAttributes> for DimensionAttributes {
  fn from(value: CustomerAttributes) -> Self { Self::Customer(value) }
}

impl From<ProductAttributes> for DimensionAttributes {
  fn from(value: ProductAttributes) -> Self { Self::Product(value) }
}

impl From<RepresentativeAttributes> for DimensionAttributes {
  fn from(value: RepresentativeAttributes) -> Self { Self::Representative(value) }
}

impl From<SupplierAttributes> for DimensionAttributes {
  fn from(value: SupplierAttributes) -> Self { Self::Supplier(value) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One version of a dimension entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
  /// Generated once per version; never reused.
  pub surrogate_key:   Uuid,
  pub kind:            DimensionKind,
  /// The business identifier, shared by every version of the entity.
  pub natural_id:      String,
  pub attributes:      DimensionAttributes,
  pub effective_date:  DateTime<Utc>,
  /// `None` while the version is open-ended.
  pub expiration_date: Option<DateTime<Utc>>,
  pub is_current:      bool,
}

impl DimensionRow {
  /// A fresh, open-ended, current version starting at `effective_date`.
  pub fn first_version(
    natural_id: impl Into<String>,
    attributes: DimensionAttributes,
    effective_date: DateTime<Utc>,
  ) -> Self {
    Self {
      surrogate_key: Uuid::new_v4(),
      kind: attributes.kind(),
      natural_id: natural_id.into(),
      attributes,
      effective_date,
      expiration_date: None,
      is_current: true,
    }
  }

  /// The version that replaces `self` from `effective_at` onwards.
  pub fn successor(
    &self,
    attributes: DimensionAttributes,
    effective_at: DateTime<Utc>,
  ) -> Self {
    Self::first_version(self.natural_id.clone(), attributes, effective_at)
  }

  /// Whether `at` falls inside `[effective_date, expiration_date)`.
  pub fn covers(&self, at: DateTime<Utc>) -> bool {
    self.effective_date <= at && self.expiration_date.is_none_or(|end| at < end)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn supplier() -> SupplierAttributes {
    SupplierAttributes {
      name:                 "Acme Components".into(),
      supplier_description: "Fasteners and fittings".into(),
      contact_name:         "R. Runner".into(),
      contact_email:        "orders@acme.example".into(),
      phone:                "+27 21 555 0100".into(),
      address:              "1 Canyon Road".into(),
      city:                 "Cape Town".into(),
      country:              "South Africa".into(),
      postal_code:          "8001".into(),
      region:               None,
      products_supplied:    42,
      supplier_rating:      Some("A".into()),
      reliability_score:    Some(97),
      supplier_type:        Some("manufacturer".into()),
      supplier_tier:        None,
      partnership_status:   PartnershipStatus::Active,
      contract_start_date:  None,
      contract_end_date:    None,
      preferred_supplier:   true,
    }
  }

  #[test]
  fn attributes_roundtrip_through_parts() {
    let attrs = DimensionAttributes::from(supplier());
    let json = attrs.to_json().unwrap();
    assert!(json.get("kind").is_none());

    let back = DimensionAttributes::from_parts(DimensionKind::Supplier, json).unwrap();
    assert_eq!(back, attrs);
  }

  #[test]
  fn ensure_kind_rejects_mismatch() {
    let attrs = DimensionAttributes::from(supplier());
    assert!(attrs.ensure_kind(DimensionKind::Supplier).is_ok());
    assert!(matches!(
      attrs.ensure_kind(DimensionKind::Customer),
      Err(Error::KindMismatch {
        expected: DimensionKind::Customer,
        supplied: DimensionKind::Supplier,
      })
    ));
  }

  #[test]
  fn covers_is_half_open() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    let mut row = DimensionRow::first_version("S1", supplier().into(), start);

    assert!(row.covers(start));
    assert!(!row.covers(start - chrono::Duration::seconds(1)));
    assert!(row.covers(end));

    row.expiration_date = Some(end);
    assert!(!row.covers(end));
    assert!(row.covers(end - chrono::Duration::seconds(1)));
  }

  #[test]
  fn stock_status_thresholds() {
    assert_eq!(StockStatus::classify(0, 10), StockStatus::OutOfStock);
    assert_eq!(StockStatus::classify(10, 10), StockStatus::LowStock);
    assert_eq!(StockStatus::classify(11, 10), StockStatus::InStock);
  }

  #[test]
  fn kind_strings() {
    assert_eq!(DimensionKind::Representative.to_string(), "representative");
    assert_eq!(
      "supplier".parse::<DimensionKind>().unwrap(),
      DimensionKind::Supplier
    );
  }
}
