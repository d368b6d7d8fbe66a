//! Operational records and the boundary into the star schema.
//!
//! These mirror the collections of the operational store. Several business
//! values arrive as loosely formatted text (`"5000"`, `"10%"`, `"R 19.99"`);
//! they are parsed into numbers here, once, and never travel further as
//! strings. Cross-references between records are identifiers only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  dimension::{
    CustomerAttributes, PartnershipStatus, ProductAttributes, RepresentativeAttributes,
    RepresentativeStatus, StockStatus, SupplierAttributes,
  },
  fact::Transaction,
  Error, Result,
};

/// Stock level at or below which a product counts as low on stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id:          String,
  pub name:                 String,
  pub email:                String,
  pub credit_limit:         String,
  pub discount:             String,
  pub normal_payment_terms: String,
  pub region_code:          i64,
  pub rep_code:             i64,
  pub settle_terms:         String,
  pub customer_category:    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub product_id:   String,
  pub brand:        String,
  pub category:     String,
  pub name:         String,
  pub description:  String,
  pub price:        String,
  pub stock:        i64,
  pub supplier_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
  pub rep_code:          String,
  pub rep_description:   String,
  pub commission_method: String,
  pub commission:        String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
  pub supplier_id:          String,
  pub supplier_description: String,
  pub name:                 String,
  pub contact_name:         String,
  pub contact_email:        String,
  pub phone:                String,
  pub address:              String,
  pub city:                 String,
  pub country:              String,
  pub postal_code:          String,
  pub products_supplied:    i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
  pub payment_id:        String,
  pub customer_id:       String,
  pub amount:            i64,
  pub payment_date:      String,
  pub payment_method:    String,
  pub status:            String,
  pub representative_id: String,
  pub product_ids:       Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
  pub sales_id:          String,
  pub product_ids:       Vec<String>,
  pub quantity:          i64,
  pub price:             String,
  pub customer_id:       String,
  pub representative_id: String,
  pub sales_date:        String,
  pub status:            String,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a monetary amount such as `"5000"`, `"1,250.50"` or `"$19.99"`.
pub fn parse_amount(field: &'static str, raw: &str) -> Result<f64> {
  let cleaned: String = raw
    .trim()
    .trim_start_matches(|c: char| c.is_alphabetic() || c == '$' || c.is_whitespace())
    .chars()
    .filter(|c| *c != ',')
    .collect();

  match cleaned.parse::<f64>() {
    Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
    _ => Err(Error::InvalidField { field, value: raw.to_owned() }),
  }
}

/// Parse a percentage such as `"10%"` or `"7.5"` into its numeric value
/// (`10.0`, `7.5`). Must lie in `0..=100`.
pub fn parse_percentage(field: &'static str, raw: &str) -> Result<f64> {
  let trimmed = raw.trim();
  let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();

  match number.parse::<f64>() {
    Ok(v) if (0.0..=100.0).contains(&v) => Ok(v),
    _ => Err(Error::InvalidField { field, value: raw.to_owned() }),
  }
}

/// Parse either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (taken as
/// midnight UTC).
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>> {
  let raw_trim = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw_trim) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(raw_trim, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
    .ok_or_else(|| Error::InvalidField { field, value: raw.to_owned() })
}

fn require_email(field: &'static str, raw: &str) -> Result<String> {
  let trimmed = raw.trim();
  match trimmed.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
      Ok(trimmed.to_owned())
    }
    _ => Err(Error::InvalidField { field, value: raw.to_owned() }),
  }
}

// ─── Dimension snapshots ─────────────────────────────────────────────────────

impl TryFrom<&Customer> for CustomerAttributes {
  type Error = Error;

  fn try_from(c: &Customer) -> Result<Self> {
    Ok(Self {
      name:                 c.name.clone(),
      email:                require_email("email", &c.email)?,
      category:             c.customer_category.clone(),
      customer_category:    c.customer_category.clone(),
      credit_limit:         parse_amount("credit_limit", &c.credit_limit)?,
      discount_percentage:  parse_percentage("discount", &c.discount)?,
      normal_payment_terms: c.normal_payment_terms.clone(),
      settle_terms:         c.settle_terms.clone(),
      region_code:          c.region_code,
      region_name:          None,
      rep_code:             Some(c.rep_code.to_string()),
    })
  }
}

impl ProductAttributes {
  /// Build a snapshot, classifying stock against `low_stock_threshold`.
  pub fn from_product(p: &Product, low_stock_threshold: i64) -> Result<Self> {
    Ok(Self {
      name:                p.name.clone(),
      description:         p.description.clone(),
      brand:               p.brand.clone(),
      category:            p.category.clone(),
      price:               parse_amount("price", &p.price)?,
      cost:                None,
      margin:              None,
      stock_level:         p.stock,
      stock_status:        StockStatus::classify(p.stock, low_stock_threshold),
      product_category:    p.category.clone(),
      product_subcategory: None,
      product_line:        None,
    })
  }

  /// Attach a cost price and derive the margin from it.
  pub fn with_cost(mut self, cost: f64) -> Self {
    self.cost = Some(cost);
    self.margin = (self.price > 0.0).then(|| (self.price - cost) / self.price);
    self
  }
}

impl TryFrom<&Product> for ProductAttributes {
  type Error = Error;

  fn try_from(p: &Product) -> Result<Self> {
    Self::from_product(p, DEFAULT_LOW_STOCK_THRESHOLD)
  }
}

impl TryFrom<&Representative> for RepresentativeAttributes {
  type Error = Error;

  fn try_from(r: &Representative) -> Result<Self> {
    Ok(Self {
      rep_description:       r.rep_description.clone(),
      rep_name:              None,
      rep_title:             None,
      commission_method:     r.commission_method.clone(),
      commission_percentage: parse_percentage("commission", &r.commission)?,
      commission_tier:       None,
      territory:             None,
      region:                None,
      status:                RepresentativeStatus::Active,
      hire_date:             None,
    })
  }
}

impl TryFrom<&Supplier> for SupplierAttributes {
  type Error = Error;

  fn try_from(s: &Supplier) -> Result<Self> {
    if s.products_supplied < 0 {
      return Err(Error::InvalidField {
        field: "products_supplied",
        value: s.products_supplied.to_string(),
      });
    }
    Ok(Self {
      name:                 s.name.clone(),
      supplier_description: s.supplier_description.clone(),
      contact_name:         s.contact_name.clone(),
      contact_email:        require_email("contact_email", &s.contact_email)?,
      phone:                s.phone.clone(),
      address:              s.address.clone(),
      city:                 s.city.clone(),
      country:              s.country.clone(),
      postal_code:          s.postal_code.clone(),
      region:               None,
      products_supplied:    s.products_supplied,
      supplier_rating:      None,
      reliability_score:    None,
      supplier_type:        None,
      supplier_tier:        None,
      partnership_status:   PartnershipStatus::Active,
      contract_start_date:  None,
      contract_end_date:    None,
      preferred_supplier:   false,
    })
  }
}

// ─── Transactions ────────────────────────────────────────────────────────────

impl Sale {
  /// One `sale` transaction per product line. The sale's status is carried
  /// verbatim as the payment status and validated during assembly.
  pub fn transactions(&self) -> Result<Vec<Transaction>> {
    if self.product_ids.is_empty() {
      return Err(Error::InvalidField {
        field: "product_ids",
        value: format!("sale {} lists no products", self.sales_id),
      });
    }
    let unit_price = parse_amount("price", &self.price)?;
    let date = parse_timestamp("sales_date", &self.sales_date)?;

    Ok(
      self
        .product_ids
        .iter()
        .map(|product_id| Transaction {
          transaction_id:    self.sales_id.clone(),
          customer_id:       self.customer_id.clone(),
          product_id:        product_id.clone(),
          representative_id: self.representative_id.clone(),
          supplier_id:       None,
          date,
          quantity:          self.quantity,
          unit_price,
          discount_amount:   0.0,
          payment_amount:    0.0,
          payment_method:    None,
          payment_status:    self.status.clone(),
          transaction_type:  "sale".into(),
          payment_date:      None,
          sales_id:          Some(self.sales_id.clone()),
          payment_id:        None,
        })
        .collect(),
    )
  }
}

impl Payment {
  /// A `payment` transaction attributed to the first product the payment
  /// covers.
  pub fn transaction(&self) -> Result<Transaction> {
    let product_id = self.product_ids.first().ok_or_else(|| Error::InvalidField {
      field: "product_ids",
      value: format!("payment {} lists no products", self.payment_id),
    })?;
    let date = parse_timestamp("payment_date", &self.payment_date)?;

    Ok(Transaction {
      transaction_id:    self.payment_id.clone(),
      customer_id:       self.customer_id.clone(),
      product_id:        product_id.clone(),
      representative_id: self.representative_id.clone(),
      supplier_id:       None,
      date,
      quantity:          0,
      unit_price:        0.0,
      discount_amount:   0.0,
      payment_amount:    self.amount as f64,
      payment_method:    Some(self.payment_method.clone()),
      payment_status:    self.status.clone(),
      transaction_type:  "payment".into(),
      payment_date:      Some(date),
      sales_id:          None,
      payment_id:        Some(self.payment_id.clone()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn customer() -> Customer {
    Customer {
      customer_id:          "C001".into(),
      name:                 "John Doe".into(),
      email:                "john.doe@example.com".into(),
      credit_limit:         "5000".into(),
      discount:             "10%".into(),
      normal_payment_terms: "30 days".into(),
      region_code:          1,
      rep_code:             101,
      settle_terms:         "Net 30".into(),
      customer_category:    "Regular".into(),
    }
  }

  #[test]
  fn customer_numbers_are_parsed() {
    let attrs = CustomerAttributes::try_from(&customer()).unwrap();
    assert_eq!(attrs.credit_limit, 5000.0);
    assert_eq!(attrs.discount_percentage, 10.0);
    assert_eq!(attrs.rep_code.as_deref(), Some("101"));
    assert_eq!(attrs.category, "Regular");
  }

  #[test]
  fn malformed_customer_fields_are_rejected() {
    let mut c = customer();
    c.credit_limit = "lots".into();
    assert!(matches!(
      CustomerAttributes::try_from(&c),
      Err(Error::InvalidField { field: "credit_limit", .. })
    ));

    let mut c = customer();
    c.discount = "110%".into();
    assert!(matches!(
      CustomerAttributes::try_from(&c),
      Err(Error::InvalidField { field: "discount", .. })
    ));

    let mut c = customer();
    c.email = "not-an-email".into();
    assert!(matches!(
      CustomerAttributes::try_from(&c),
      Err(Error::InvalidField { field: "email", .. })
    ));
  }

  #[test]
  fn amount_formats() {
    assert_eq!(parse_amount("price", " 1,250.50 ").unwrap(), 1250.5);
    assert_eq!(parse_amount("price", "$19.99").unwrap(), 19.99);
    assert_eq!(parse_amount("price", "R 12").unwrap(), 12.0);
    assert!(parse_amount("price", "-3").is_err());
    assert!(parse_amount("price", "").is_err());
  }

  #[test]
  fn product_snapshot_and_margin() {
    let p = Product {
      product_id:   "P1".into(),
      brand:        "Acme".into(),
      category:     "Hardware".into(),
      name:         "Bolt".into(),
      description:  "M8 bolt".into(),
      price:        "20".into(),
      stock:        4,
      supplier_ids: vec!["S1".into()],
    };
    let attrs = ProductAttributes::try_from(&p).unwrap().with_cost(15.0);
    assert_eq!(attrs.stock_status, StockStatus::LowStock);
    assert_eq!(attrs.price, 20.0);
    assert_eq!(attrs.margin, Some(0.25));
  }

  #[test]
  fn sale_expands_per_product() {
    let sale = Sale {
      sales_id:          "SL-9".into(),
      product_ids:       vec!["P1".into(), "P2".into()],
      quantity:          2,
      price:             "7.50".into(),
      customer_id:       "C001".into(),
      representative_id: "R1".into(),
      sales_date:        "2025-03-04".into(),
      status:            "completed".into(),
    };
    let txs = sale.transactions().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[1].product_id, "P2");
    assert_eq!(txs[0].unit_price, 7.5);
    assert_eq!(txs[0].transaction_type, "sale");
    assert_eq!(txs[0].date.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    assert_eq!(txs[0].sales_id.as_deref(), Some("SL-9"));
  }

  #[test]
  fn payment_without_products_is_rejected() {
    let payment = Payment {
      payment_id:        "PM-1".into(),
      customer_id:       "C001".into(),
      amount:            300,
      payment_date:      "2025-03-05T10:00:00Z".into(),
      payment_method:    "bank_transfer".into(),
      status:            "completed".into(),
      representative_id: "R1".into(),
      product_ids:       vec![],
    };
    assert!(matches!(
      payment.transaction(),
      Err(Error::InvalidField { field: "product_ids", .. })
    ));

    let payment = Payment { product_ids: vec!["P1".into()], ..payment };
    let tx = payment.transaction().unwrap();
    assert_eq!(tx.payment_amount, 300.0);
    assert_eq!(tx.transaction_type, "payment");
    assert_eq!(tx.payment_date, Some(tx.date));
  }
}
